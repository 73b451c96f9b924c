// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BRONZE_BUCKET: &str = "bronze-bucket";
pub const SILVER_BUCKET: &str = "silver-bucket";
pub const GOLD_BUCKET: &str = "gold-bucket";

pub const RAW_TOPIC: &str = "manufacturing.telemetry.raw";
pub const RAW_TOPIC_PARTITIONS: u32 = 1;
pub const RAW_TOPIC_REPLICATION: u16 = 1;
/// Group whose committed offsets define what is still "in queue".
pub const CONSUMER_GROUP: &str = "manufacturing-consumer-group";

pub const CLEANSED_TABLE: &str = "telemetry.cleansed";
pub const KPI_TABLE: &str = "manufacturing.kpis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Bronze, Layer::Silver, Layer::Gold];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }

    #[must_use]
    pub const fn bucket(self) -> &'static str {
        match self {
            Self::Bronze => BRONZE_BUCKET,
            Self::Silver => SILVER_BUCKET,
            Self::Gold => GOLD_BUCKET,
        }
    }

    #[must_use]
    pub const fn topic(self) -> Option<&'static str> {
        match self {
            Self::Bronze => Some(RAW_TOPIC),
            _ => None,
        }
    }

    #[must_use]
    pub const fn table(self) -> Option<&'static str> {
        match self {
            Self::Bronze => None,
            Self::Silver => Some(CLEANSED_TABLE),
            Self::Gold => Some(KPI_TABLE),
        }
    }

    /// Layer whose bucket holds the given table namespace.
    #[must_use]
    pub fn for_table(ident_table: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|layer| layer.table().is_some_and(|t| table_matches(ident_table, t)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerStatus {
    Ready,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerReadiness {
    pub status: LayerStatus,
    pub details: BTreeMap<String, bool>,
}

impl LayerReadiness {
    #[must_use]
    pub fn missing() -> Self {
        Self {
            status: LayerStatus::Missing,
            details: BTreeMap::new(),
        }
    }
}

/// True when `name` is `target` itself or a qualified form ending in `.target`.
#[must_use]
pub fn table_matches(name: &str, target: &str) -> bool {
    name == target
        || name
            .strip_suffix(target)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[must_use]
pub fn evaluate_readiness(
    buckets: &[String],
    topics: &[String],
    tables: &[String],
) -> BTreeMap<Layer, LayerReadiness> {
    Layer::ALL
        .into_iter()
        .map(|layer| {
            let mut details = BTreeMap::new();
            details.insert(
                "bucket".to_string(),
                buckets.iter().any(|b| b == layer.bucket()),
            );
            if let Some(topic) = layer.topic() {
                details.insert("topic".to_string(), topics.iter().any(|t| t == topic));
            }
            if let Some(table) = layer.table() {
                details.insert(
                    "table".to_string(),
                    tables.iter().any(|t| table_matches(t, table)),
                );
            }
            let status = if details.values().all(|present| *present) {
                LayerStatus::Ready
            } else {
                LayerStatus::Missing
            };
            (layer, LayerReadiness { status, details })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn table_match_requires_dot_boundary() {
        assert!(table_matches("telemetry.cleansed", "telemetry.cleansed"));
        assert!(table_matches("silver-bucket.telemetry.cleansed", "telemetry.cleansed"));
        assert!(!table_matches("xtelemetry.cleansed", "telemetry.cleansed"));
        assert!(!table_matches("telemetry.cleansed_v2", "telemetry.cleansed"));
    }

    #[test]
    fn readiness_is_per_layer() {
        let readiness = evaluate_readiness(
            &names(&["bronze-bucket", "silver-bucket", "gold-bucket"]),
            &names(&[RAW_TOPIC]),
            &names(&["telemetry.cleansed"]),
        );
        assert_eq!(readiness[&Layer::Bronze].status, LayerStatus::Ready);
        assert_eq!(readiness[&Layer::Silver].status, LayerStatus::Ready);
        assert_eq!(readiness[&Layer::Gold].status, LayerStatus::Missing);
        assert_eq!(readiness[&Layer::Gold].details["bucket"], true);
        assert_eq!(readiness[&Layer::Gold].details["table"], false);
        assert!(!readiness[&Layer::Bronze].details.contains_key("table"));
    }

    #[test]
    fn layers_resolve_from_table_names() {
        assert_eq!(Layer::for_table("telemetry.cleansed"), Some(Layer::Silver));
        assert_eq!(Layer::for_table("manufacturing.kpis"), Some(Layer::Gold));
        assert_eq!(Layer::for_table("other.table"), None);
    }
}
