// SPDX-License-Identifier: Apache-2.0

//! Iceberg-style table catalogs.

mod polaris;
mod sqlite;

pub use polaris::{PolarisCatalog, PolarisConfig};
pub use sqlite::SqliteCatalog;

use crate::error::PlatformError;
use async_trait::async_trait;
use medallion_model::{ProvisionStatus, TableIdent, TableMetrics, TableSchema, TableSummary};
use serde_json::{Map, Value};

#[async_trait]
pub trait TableCatalog: Send + Sync + 'static {
    /// Fully qualified `namespace.table` names.
    async fn list_tables(&self) -> Result<Vec<TableSummary>, PlatformError>;
    /// Idempotent: an existing table yields `Skipped`.
    async fn create_table(
        &self,
        ident: &TableIdent,
        schema: &TableSchema,
        location: &str,
    ) -> Result<ProvisionStatus, PlatformError>;
    /// Commits `rows` as one snapshot and returns the number of rows written.
    async fn append(&self, ident: &TableIdent, rows: &[Value]) -> Result<u64, PlatformError>;
    async fn scan(&self, ident: &TableIdent) -> Result<Vec<Value>, PlatformError>;
    async fn metrics(&self, ident: &TableIdent) -> Result<TableMetrics, PlatformError>;
}

/// Warehouse location of a table inside its layer bucket.
#[must_use]
pub fn table_location(bucket: &str, ident: &TableIdent) -> String {
    format!("s3://{bucket}/iceberg/{}/{}", ident.namespace, ident.name)
}

/// Keeps only the schema's columns, filling absent ones with null.
#[must_use]
pub fn project_row(schema: &TableSchema, row: &Value) -> Value {
    let mut out = Map::new();
    for field in &schema.fields {
        let value = row.get(&field.name).cloned().unwrap_or(Value::Null);
        out.insert(field.name.clone(), value);
    }
    Value::Object(out)
}

/// Random positive snapshot id, as Iceberg writers generate them.
pub(crate) fn new_snapshot_id() -> i64 {
    use rand::Rng;
    rand::thread_rng().gen_range(1..i64::MAX)
}
