// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub name: String,
    #[serde(default)]
    pub creation_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub name: String,
    pub partitions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDetail {
    pub bucket: String,
    pub object_count: usize,
    pub total_size_bytes: u64,
    pub objects: Vec<ObjectSummary>,
}

impl BucketDetail {
    #[must_use]
    pub fn from_objects(bucket: &str, objects: Vec<ObjectSummary>) -> Self {
        Self {
            bucket: bucket.to_string(),
            object_count: objects.len(),
            total_size_bytes: objects.iter().map(|o| o.size).sum(),
            objects,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMetrics {
    pub topic: String,
    pub messages_count: u64,
    #[serde(default)]
    pub recent_message: Option<String>,
    pub delay_seconds: f64,
    pub partitions: u32,
    pub consumers: u32,
    pub in_queue: u64,
}

impl TopicMetrics {
    #[must_use]
    pub fn empty(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            messages_count: 0,
            recent_message: None,
            delay_seconds: 0.0,
            partitions: 0,
            consumers: 1,
            in_queue: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub partition: u32,
    pub offset: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedTopicMetrics {
    pub topic: String,
    pub total_messages: u64,
    pub in_queue: u64,
    pub processed: u64,
    pub invalidated_count: u64,
    pub latest_message_timestamp: Option<String>,
    pub last_processed_timestamp: Option<String>,
    pub lag_seconds: f64,
    pub processing_rate: f64,
    pub queue_depth_percent: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(&format!("{raw}Z")).ok())
}

impl DetailedTopicMetrics {
    #[must_use]
    pub fn derive(metrics: &TopicMetrics, latest_message_timestamp: Option<String>) -> Self {
        let lag_seconds = metrics.delay_seconds.max(0.0);
        let in_queue = metrics.in_queue;
        let total = metrics.messages_count;

        let last_processed_timestamp = match latest_message_timestamp.as_deref() {
            Some(latest) if lag_seconds > 0.0 => parse_timestamp(latest)
                .map(|ts| {
                    let lag = Duration::milliseconds((lag_seconds * 1000.0).round() as i64);
                    (ts - lag).to_rfc3339()
                }),
            Some(latest) => Some(latest.to_string()),
            None => None,
        };
        let processing_rate = if lag_seconds > 0.0 && in_queue > 0 {
            round_to(in_queue as f64 / lag_seconds, 1)
        } else {
            0.0
        };
        let queue_depth_percent = if total > 0 {
            round_to(in_queue as f64 / total as f64 * 100.0, 1)
        } else {
            0.0
        };

        Self {
            topic: metrics.topic.clone(),
            total_messages: total,
            in_queue,
            processed: total.saturating_sub(in_queue),
            invalidated_count: 0,
            latest_message_timestamp,
            last_processed_timestamp,
            lag_seconds,
            processing_rate,
            queue_depth_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetrics {
    pub name: String,
    pub record_count: u64,
    pub snapshot_count: u64,
    #[serde(default)]
    pub current_snapshot_id: Option<i64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl TableMetrics {
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            record_count: 0,
            snapshot_count: 0,
            current_snapshot_id: None,
            last_updated: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub data: Vec<Value>,
    pub metrics: TableMetrics,
}

fn sort_key(row: &Value) -> Option<&str> {
    row.get("timestamp")
        .or_else(|| row.get("window_start"))
        .and_then(Value::as_str)
}

/// Orders table rows newest first by `timestamp`, falling back to `window_start`.
pub fn sort_rows_recent_first(rows: &mut [Value]) {
    rows.sort_by(|a, b| match (sort_key(a), sort_key(b)) {
        (Some(x), Some(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => ty.cmp(&tx),
            _ => y.cmp(x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
