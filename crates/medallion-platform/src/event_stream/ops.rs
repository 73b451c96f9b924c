// SPDX-License-Identifier: Apache-2.0

//! Topic views built on [`EventStream`]: metrics, browsing and group consumption.

use super::{CommittedOffsets, EventStream, PartitionOffsets};
use crate::error::PlatformError;
use chrono::{DateTime, FixedOffset, Utc};
use medallion_model::{TopicMessage, TopicMetrics};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

pub const DEFAULT_PUBLISH_LIMIT: usize = 100;

fn parse_ts(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(&format!("{raw}Z")).ok())
}

fn start_offset(p: &PartitionOffsets, committed: Option<&CommittedOffsets>) -> u64 {
    committed
        .and_then(|c| c.get(&p.partition).copied())
        .unwrap_or(p.beginning)
        .max(p.beginning)
}

fn preview(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn newest_first(a: &TopicMessage, b: &TopicMessage) -> Ordering {
    let ta = a.timestamp.as_deref().and_then(parse_ts);
    let tb = b.timestamp.as_deref().and_then(parse_ts);
    match (ta, tb) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.offset.cmp(&a.offset),
    }
}

/// Message counts, queue depth and processing delay of `topic` for `group`.
///
/// When the group's committed offsets cannot be read the queue is reported empty.
pub async fn topic_metrics(
    stream: &dyn EventStream,
    topic: &str,
    group: &str,
    now: DateTime<Utc>,
) -> Result<TopicMetrics, PlatformError> {
    let mut metrics = TopicMetrics::empty(topic);
    let partitions = stream.partition_offsets(topic).await?;
    if partitions.is_empty() {
        return Ok(metrics);
    }
    metrics.partitions = partitions.len() as u32;
    metrics.messages_count = partitions.iter().map(PartitionOffsets::len).sum();

    match stream.committed_offsets(group, topic).await {
        Ok(committed) => {
            let mut oldest: Option<DateTime<FixedOffset>> = None;
            for p in &partitions {
                let from = start_offset(p, Some(&committed));
                let lag = p.end.saturating_sub(from);
                metrics.in_queue += lag;
                if lag == 0 {
                    continue;
                }
                let head = stream.fetch(topic, p.partition, from, 1).await?;
                if let Some(ts) = head
                    .first()
                    .and_then(|m| m.timestamp.as_deref())
                    .and_then(parse_ts)
                {
                    oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
                }
            }
            if let Some(ts) = oldest {
                let delay_ms = (now - ts.with_timezone(&Utc)).num_milliseconds();
                let delay = (delay_ms as f64 / 10.0).round() / 100.0;
                metrics.delay_seconds = delay.max(0.0);
            }
        }
        Err(err) => {
            debug!(topic, group, error = %err, "committed offsets unavailable");
            metrics.in_queue = 0;
        }
    }

    let latest = partitions
        .iter()
        .filter(|p| !p.is_empty())
        .max_by_key(|p| p.end);
    if let Some(p) = latest {
        let tail = stream.fetch(topic, p.partition, p.end - 1, 1).await?;
        metrics.recent_message = tail.first().map(|m| preview(&m.value));
    }
    Ok(metrics)
}

/// Most recent records across partitions, newest first. Offsets are not committed.
pub async fn list_messages(
    stream: &dyn EventStream,
    topic: &str,
    limit: usize,
) -> Result<Vec<TopicMessage>, PlatformError> {
    let partitions = stream.partition_offsets(topic).await?;
    if partitions.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let per_partition = (limit / partitions.len()).max(1);
    let mut out = Vec::new();
    for p in partitions.iter().filter(|p| !p.is_empty()) {
        let from = p.end.saturating_sub(per_partition as u64).max(p.beginning);
        out.extend(stream.fetch(topic, p.partition, from, per_partition).await?);
    }
    out.sort_by(newest_first);
    out.truncate(limit);
    Ok(out)
}

async fn read_from_committed(
    stream: &dyn EventStream,
    topic: &str,
    committed: Option<&CommittedOffsets>,
    limit: usize,
) -> Result<Vec<TopicMessage>, PlatformError> {
    let partitions = stream.partition_offsets(topic).await?;
    let mut out = Vec::new();
    for p in &partitions {
        let remaining = limit.saturating_sub(out.len());
        if remaining == 0 {
            break;
        }
        let from = start_offset(p, committed);
        if from >= p.end {
            continue;
        }
        out.extend(stream.fetch(topic, p.partition, from, remaining).await?);
    }
    Ok(out)
}

/// Records `group` has not consumed yet, oldest first, without committing.
pub async fn list_unprocessed(
    stream: &dyn EventStream,
    topic: &str,
    group: &str,
    limit: usize,
) -> Result<Vec<TopicMessage>, PlatformError> {
    let committed = match stream.committed_offsets(group, topic).await {
        Ok(c) => Some(c),
        Err(err) => {
            debug!(topic, group, error = %err, "committed offsets unavailable, reading from beginning");
            None
        }
    };
    read_from_committed(stream, topic, committed.as_ref(), limit).await
}

/// Reads up to `max` records past the group's committed offsets and commits past them.
pub async fn consume_and_commit(
    stream: &dyn EventStream,
    topic: &str,
    group: &str,
    max: usize,
) -> Result<Vec<TopicMessage>, PlatformError> {
    let committed = stream.committed_offsets(group, topic).await?;
    let records = read_from_committed(stream, topic, Some(&committed), max).await?;
    let mut next = CommittedOffsets::new();
    for record in &records {
        let entry = next.entry(record.partition).or_insert(0);
        *entry = (*entry).max(record.offset + 1);
    }
    stream.commit(group, topic, &next).await?;
    debug!(topic, group, consumed = records.len(), "consumer group advanced");
    Ok(records)
}

/// Produces at most `limit` of `values`; returns how many were accepted.
pub async fn publish(
    stream: &dyn EventStream,
    topic: &str,
    values: &[Value],
    limit: usize,
) -> Result<usize, PlatformError> {
    let batch = &values[..values.len().min(limit)];
    stream.produce(topic, batch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEventStream;
    use chrono::TimeZone;
    use serde_json::json;

    fn event(i: u32) -> Value {
        json!({
            "event_id": format!("e-{i}"),
            "timestamp": format!("2024-05-01T10:00:{i:02}Z"),
            "temperature": 70.0,
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 1, 0).single().expect("ts")
    }

    #[tokio::test]
    async fn metrics_count_uncommitted_records_from_beginning() {
        let stream = FakeEventStream::new();
        stream.add_topic("raw", 1).await;
        let values: Vec<Value> = (0..5).map(event).collect();
        publish(&stream, "raw", &values, DEFAULT_PUBLISH_LIMIT)
            .await
            .expect("publish");

        let m = topic_metrics(&stream, "raw", "g", now()).await.expect("metrics");
        assert_eq!(m.messages_count, 5);
        assert_eq!(m.in_queue, 5);
        assert_eq!(m.partitions, 1);
        assert_eq!(m.consumers, 1);
        assert!((m.delay_seconds - 60.0).abs() < f64::EPSILON);
        let recent: Value = serde_json::from_str(m.recent_message.as_deref().expect("recent"))
            .expect("json");
        assert_eq!(recent["event_id"], "e-4");
    }

    #[tokio::test]
    async fn consume_commits_next_offsets() {
        let stream = FakeEventStream::new();
        stream.add_topic("raw", 1).await;
        let values: Vec<Value> = (0..4).map(event).collect();
        publish(&stream, "raw", &values, 10).await.expect("publish");

        let first = consume_and_commit(&stream, "raw", "g", 3).await.expect("consume");
        assert_eq!(first.len(), 3);
        let queue = list_unprocessed(&stream, "raw", "g", 50).await.expect("queue");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].offset, 3);

        let m = topic_metrics(&stream, "raw", "g", now()).await.expect("metrics");
        assert_eq!(m.in_queue, 1);
        assert!((m.delay_seconds - 57.0).abs() < f64::EPSILON);

        let rest = consume_and_commit(&stream, "raw", "g", 10).await.expect("consume");
        assert_eq!(rest.len(), 1);
        let m = topic_metrics(&stream, "raw", "g", now()).await.expect("metrics");
        assert_eq!(m.in_queue, 0);
        assert_eq!(m.delay_seconds, 0.0);
    }

    #[tokio::test]
    async fn list_messages_is_newest_first_and_limited() {
        let stream = FakeEventStream::new();
        stream.add_topic("raw", 1).await;
        let values: Vec<Value> = (0..10).map(event).collect();
        publish(&stream, "raw", &values, 100).await.expect("publish");

        let messages = list_messages(&stream, "raw", 3).await.expect("messages");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].value["event_id"], "e-9");
        assert_eq!(messages[2].value["event_id"], "e-7");
    }

    #[tokio::test]
    async fn publish_truncates_to_limit() {
        let stream = FakeEventStream::new();
        stream.add_topic("raw", 1).await;
        let values: Vec<Value> = (0..150).map(|i| json!({"i": i})).collect();
        let sent = publish(&stream, "raw", &values, DEFAULT_PUBLISH_LIMIT)
            .await
            .expect("publish");
        assert_eq!(sent, 100);
        let m = topic_metrics(&stream, "raw", "g", now()).await.expect("metrics");
        assert_eq!(m.messages_count, 100);
    }

    #[tokio::test]
    async fn metrics_for_unknown_topic_are_empty() {
        let stream = FakeEventStream::new();
        let m = topic_metrics(&stream, "missing", "g", now()).await.expect("metrics");
        assert_eq!(m, TopicMetrics::empty("missing"));
    }
}
