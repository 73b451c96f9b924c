// SPDX-License-Identifier: Apache-2.0

use crate::medallion::{evaluate_readiness, table_matches, Layer, LayerReadiness};
use crate::metrics::{BucketSummary, TableSummary, TopicSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated view polled by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardData {
    pub configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrapped: Option<bool>,
    pub topics: Vec<TopicSummary>,
    pub tables: Vec<TableSummary>,
    pub buckets: Vec<BucketSummary>,
    pub readiness: BTreeMap<Layer, LayerReadiness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DashboardData {
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            bootstrapped: None,
            topics: Vec::new(),
            tables: Vec::new(),
            buckets: Vec::new(),
            readiness: BTreeMap::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn not_bootstrapped() -> Self {
        Self {
            configured: true,
            bootstrapped: Some(false),
            readiness: Layer::ALL
                .into_iter()
                .map(|layer| (layer, LayerReadiness::missing()))
                .collect(),
            ..Self::unconfigured()
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            configured: true,
            bootstrapped: Some(true),
            error: Some(error.into()),
            ..Self::unconfigured()
        }
    }

    /// Keeps only the resources the medallion layout expects and scores each layer.
    #[must_use]
    pub fn assemble(
        buckets: Vec<BucketSummary>,
        topics: Vec<TopicSummary>,
        tables: Vec<TableSummary>,
    ) -> Self {
        let bucket_names: Vec<String> = buckets.iter().map(|b| b.name.clone()).collect();
        let topic_names: Vec<String> = topics.iter().map(|t| t.name.clone()).collect();
        let table_names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        let readiness = evaluate_readiness(&bucket_names, &topic_names, &table_names);

        let expected_buckets: Vec<&str> = Layer::ALL.iter().map(|l| l.bucket()).collect();
        let expected_topics: Vec<&str> = Layer::ALL.iter().filter_map(|l| l.topic()).collect();
        let expected_tables: Vec<&str> = Layer::ALL.iter().filter_map(|l| l.table()).collect();

        Self {
            configured: true,
            bootstrapped: Some(true),
            topics: topics
                .into_iter()
                .filter(|t| expected_topics.contains(&t.name.as_str()))
                .collect(),
            tables: tables
                .into_iter()
                .filter(|t| expected_tables.iter().any(|x| table_matches(&t.name, x)))
                .collect(),
            buckets: buckets
                .into_iter()
                .filter(|b| expected_buckets.contains(&b.name.as_str()))
                .collect(),
            readiness,
            error: None,
        }
    }
}
