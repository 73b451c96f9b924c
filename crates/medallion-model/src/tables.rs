// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Timestamp,
    Float,
    Long,
    Int,
}

impl FieldType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::Float => "float",
            Self::Long => "long",
            Self::Int => "int",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub id: u32,
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<SchemaField>,
}

impl TableSchema {
    #[must_use]
    pub fn from_columns(columns: &[(&str, FieldType)]) -> Self {
        Self {
            fields: columns
                .iter()
                .zip(1_u32..)
                .map(|((name, field_type), id)| SchemaField {
                    id,
                    name: (*name).to_string(),
                    field_type: *field_type,
                    required: false,
                })
                .collect(),
        }
    }

    /// Iceberg REST representation of the schema.
    #[must_use]
    pub fn to_iceberg_json(&self) -> Value {
        json!({
            "type": "struct",
            "schema-id": 0,
            "fields": self.fields.iter().map(|f| json!({
                "id": f.id,
                "name": f.name,
                "type": f.field_type.as_str(),
                "required": f.required,
            })).collect::<Vec<_>>(),
        })
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

#[must_use]
pub fn cleansed_schema() -> TableSchema {
    TableSchema::from_columns(&[
        ("event_id", FieldType::String),
        ("device_id", FieldType::String),
        ("timestamp", FieldType::Timestamp),
        ("temperature", FieldType::Float),
        ("vibration", FieldType::Float),
        ("status", FieldType::String),
    ])
}

#[must_use]
pub fn kpi_schema() -> TableSchema {
    TableSchema::from_columns(&[
        ("window_start", FieldType::Timestamp),
        ("window_end", FieldType::Timestamp),
        ("total_events", FieldType::Long),
        ("avg_temp", FieldType::Float),
        ("anomaly_count", FieldType::Int),
    ])
}

/// `namespace.table`, optionally written with a leading `<name>-bucket.` qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableIdent {
    pub namespace: String,
    pub name: String,
}

impl TableIdent {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        let unqualified = match s.split_once('.') {
            Some((head, rest)) if head.ends_with("-bucket") => rest,
            _ => s,
        };
        let (namespace, name) = unqualified.rsplit_once('.').ok_or_else(|| {
            ValidationError(format!("table identifier must be namespace.table: {input}"))
        })?;
        if namespace.is_empty() || name.is_empty() {
            return Err(ValidationError(format!(
                "table identifier must be namespace.table: {input}"
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl Display for TableIdent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}
