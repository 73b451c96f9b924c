// SPDX-License-Identifier: Apache-2.0

//! Kafka-compatible event stream access.
//!
//! [`EventStream`] is the narrow surface the pipeline needs from the broker:
//! offsets per partition, positioned reads, group commits and produce. The
//! higher-level views (`topic_metrics`, message browsing, consume-and-commit)
//! live in [`ops`] and work against any implementation.

mod kafka_rest;
pub mod ops;

pub use kafka_rest::{KafkaRestClient, KAFKA_JSON_V2};

use crate::error::PlatformError;
use async_trait::async_trait;
use medallion_model::{ProvisionStatus, TopicMessage, TopicSummary};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOffsets {
    pub partition: u32,
    pub beginning: u64,
    /// Offset the next produced record will get.
    pub end: u64,
}

impl PartitionOffsets {
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.beginning)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Next offset to read per partition, as committed by a consumer group.
pub type CommittedOffsets = BTreeMap<u32, u64>;

#[async_trait]
pub trait EventStream: Send + Sync + 'static {
    async fn probe(&self) -> Result<(), PlatformError>;
    async fn list_topics(&self) -> Result<Vec<TopicSummary>, PlatformError>;
    async fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replication: u16,
    ) -> Result<ProvisionStatus, PlatformError>;
    async fn partition_offsets(&self, topic: &str) -> Result<Vec<PartitionOffsets>, PlatformError>;
    /// Partitions without a commit are absent from the map.
    async fn committed_offsets(
        &self,
        group: &str,
        topic: &str,
    ) -> Result<CommittedOffsets, PlatformError>;
    /// Reads up to `max` records of one partition starting at `offset`.
    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        max: usize,
    ) -> Result<Vec<TopicMessage>, PlatformError>;
    /// Returns the number of records accepted.
    async fn produce(&self, topic: &str, values: &[Value]) -> Result<usize, PlatformError>;
    async fn commit(
        &self,
        group: &str,
        topic: &str,
        offsets: &CommittedOffsets,
    ) -> Result<(), PlatformError>;
}

/// Record timestamp, or the payload's own `timestamp` field when the broker has none.
pub(crate) fn record_timestamp(broker_ms: Option<i64>, value: &Value) -> Option<String> {
    broker_ms
        .filter(|ms| *ms > 0)
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|ts| ts.to_rfc3339())
        .or_else(|| {
            value
                .get("timestamp")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_timestamp_prefers_broker_time() {
        let value = json!({"timestamp": "2024-05-01T10:00:00Z"});
        assert_eq!(
            record_timestamp(Some(0), &value).as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        let broker = record_timestamp(Some(1_714_557_600_000), &value).expect("ts");
        assert!(broker.starts_with("2024-05-01T10:00:00"));
        assert_eq!(record_timestamp(None, &json!("plain")), None);
    }

    #[test]
    fn partition_len_saturates() {
        let p = PartitionOffsets {
            partition: 0,
            beginning: 5,
            end: 3,
        };
        assert!(p.is_empty());
    }
}
