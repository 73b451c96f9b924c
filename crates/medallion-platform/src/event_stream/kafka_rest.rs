// SPDX-License-Identifier: Apache-2.0

use super::{record_timestamp, CommittedOffsets, EventStream, PartitionOffsets};
use crate::error::{PlatformError, PlatformErrorCode};
use crate::http::{expect_success, parse_json, send_with_retry};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use medallion_model::{ProvisionStatus, TopicMessage, TopicSummary};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";
const KAFKA_V2: &str = "application/vnd.kafka.v2+json";
const MAX_EMPTY_POLLS: usize = 3;
const TOPIC_EXISTS_ERROR: i64 = 40002;

#[derive(Debug, Deserialize)]
struct PartitionInfo {
    partition: u32,
}

#[derive(Debug, Deserialize)]
struct OffsetsInfo {
    beginning_offset: i64,
    end_offset: i64,
}

#[derive(Debug, Deserialize)]
struct CommittedEntry {
    partition: u32,
    offset: i64,
}

#[derive(Debug, Deserialize)]
struct CommittedList {
    #[serde(default)]
    offsets: Vec<CommittedEntry>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    partition: u32,
    offset: u64,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProduceOffset {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<ProduceOffset>,
}

/// Client for a Kafka REST proxy (v2 consumer/producer API, v3 admin API).
pub struct KafkaRestClient {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
    retry: RetryPolicy,
}

impl KafkaRestClient {
    #[must_use]
    pub fn new(client: Client, endpoint: &str, username: &str, password: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.endpoint));
        if self.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        context: &str,
    ) -> Result<T, PlatformError> {
        let resp = send_with_retry(&self.retry, context, || {
            self.request(Method::GET, path)
                .header(ACCEPT, "application/vnd.kafka.v2+json, application/json")
        })
        .await?;
        let body = expect_success(resp, context).await?;
        parse_json(&body, context)
    }

    async fn cluster_id(&self) -> Result<String, PlatformError> {
        let clusters: Value = self.get_json("/v3/clusters", "kafka clusters").await?;
        clusters["data"][0]["cluster_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PlatformError::upstream("kafka clusters: no cluster_id in response"))
    }

    /// Creates a consumer instance and returns its path below the endpoint.
    async fn open_consumer(&self, group: &str) -> Result<String, PlatformError> {
        let name = format!("medallion-{}", uuid::Uuid::new_v4().simple());
        let path = format!("/consumers/{group}");
        let body = json!({
            "name": name,
            "format": "json",
            "auto.offset.reset": "earliest",
            "auto.commit.enable": "false",
        });
        let resp = send_with_retry(&self.retry, "kafka open consumer", || {
            self.request(Method::POST, &path)
                .header(CONTENT_TYPE, KAFKA_V2)
                .json(&body)
        })
        .await?;
        expect_success(resp, "kafka open consumer").await?;
        Ok(format!("/consumers/{group}/instances/{name}"))
    }

    async fn close_consumer(&self, instance: &str) {
        let result = self
            .request(Method::DELETE, instance)
            .header(CONTENT_TYPE, KAFKA_V2)
            .send()
            .await;
        if let Err(err) = result {
            debug!(instance, error = %err, "kafka consumer close failed");
        }
    }

    async fn post_instance(
        &self,
        instance: &str,
        suffix: &str,
        body: &Value,
        context: &str,
    ) -> Result<(), PlatformError> {
        let path = format!("{instance}/{suffix}");
        let resp = send_with_retry(&self.retry, context, || {
            self.request(Method::POST, &path)
                .header(CONTENT_TYPE, KAFKA_V2)
                .json(body)
        })
        .await?;
        expect_success(resp, context).await.map(|_| ())
    }

    async fn read_partition(
        &self,
        instance: &str,
        topic: &str,
        partition: u32,
        offset: u64,
        max: usize,
    ) -> Result<Vec<TopicMessage>, PlatformError> {
        let target = json!({"partitions": [{"topic": topic, "partition": partition}]});
        self.post_instance(instance, "assignments", &target, "kafka assign")
            .await?;
        let position = json!({"offsets": [{"topic": topic, "partition": partition, "offset": offset}]});
        self.post_instance(instance, "positions", &position, "kafka seek")
            .await?;

        let path = format!("{instance}/records?timeout=1000&max_bytes=1048576");
        let mut out = Vec::new();
        let mut empty_polls = 0;
        while out.len() < max && empty_polls < MAX_EMPTY_POLLS {
            let resp = send_with_retry(&self.retry, "kafka records", || {
                self.request(Method::GET, &path).header(ACCEPT, KAFKA_JSON_V2)
            })
            .await?;
            let body = expect_success(resp, "kafka records").await?;
            let batch: Vec<RawRecord> = parse_json(&body, "kafka records")?;
            if batch.is_empty() {
                empty_polls += 1;
                continue;
            }
            out.extend(
                batch
                    .into_iter()
                    .filter(|r| r.partition == partition && r.offset >= offset)
                    .map(|r| TopicMessage {
                        partition: r.partition,
                        offset: r.offset,
                        timestamp: record_timestamp(r.timestamp, &r.value),
                        value: r.value,
                    }),
            );
        }
        out.truncate(max);
        Ok(out)
    }
}

#[async_trait]
impl EventStream for KafkaRestClient {
    async fn probe(&self) -> Result<(), PlatformError> {
        self.get_json::<Vec<String>>("/topics", "kafka list topics")
            .await
            .map(|_| ())
    }

    async fn list_topics(&self) -> Result<Vec<TopicSummary>, PlatformError> {
        let names: Vec<String> = self.get_json("/topics", "kafka list topics").await?;
        let mut topics = Vec::with_capacity(names.len());
        for name in names.into_iter().filter(|n| !n.starts_with("__")) {
            let partitions: Vec<PartitionInfo> = self
                .get_json(&format!("/topics/{name}/partitions"), "kafka partitions")
                .await?;
            topics.push(TopicSummary {
                name,
                partitions: partitions.len() as u32,
            });
        }
        Ok(topics)
    }

    async fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        replication: u16,
    ) -> Result<ProvisionStatus, PlatformError> {
        if self.list_topics().await?.iter().any(|t| t.name == name) {
            return Ok(ProvisionStatus::Skipped);
        }
        let cluster = self.cluster_id().await?;
        let path = format!("/v3/clusters/{cluster}/topics");
        let body = json!({
            "topic_name": name,
            "partitions_count": partitions,
            "replication_factor": replication,
        });
        let resp = send_with_retry(&self.retry, "kafka create topic", || {
            self.request(Method::POST, &path).json(&body)
        })
        .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(PlatformError::network)?;
        if (200..300).contains(&status) {
            info!(topic = name, partitions, "topic created");
            return Ok(ProvisionStatus::Created);
        }
        let error_code = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["error_code"].as_i64());
        if status == 409 || error_code == Some(TOPIC_EXISTS_ERROR) {
            return Ok(ProvisionStatus::Skipped);
        }
        Err(PlatformError::from_status(status, "kafka create topic", &text))
    }

    async fn partition_offsets(&self, topic: &str) -> Result<Vec<PartitionOffsets>, PlatformError> {
        let partitions: Vec<PartitionInfo> = self
            .get_json(&format!("/topics/{topic}/partitions"), "kafka partitions")
            .await?;
        let mut out = Vec::with_capacity(partitions.len());
        for p in partitions {
            let offsets: OffsetsInfo = self
                .get_json(
                    &format!("/topics/{topic}/partitions/{}/offsets", p.partition),
                    "kafka partition offsets",
                )
                .await?;
            out.push(PartitionOffsets {
                partition: p.partition,
                beginning: offsets.beginning_offset.max(0) as u64,
                end: offsets.end_offset.max(0) as u64,
            });
        }
        out.sort_by_key(|p| p.partition);
        Ok(out)
    }

    async fn committed_offsets(
        &self,
        group: &str,
        topic: &str,
    ) -> Result<CommittedOffsets, PlatformError> {
        let partitions: Vec<PartitionInfo> = self
            .get_json(&format!("/topics/{topic}/partitions"), "kafka partitions")
            .await?;
        let instance = self.open_consumer(group).await?;
        let body = json!({
            "partitions": partitions
                .iter()
                .map(|p| json!({"topic": topic, "partition": p.partition}))
                .collect::<Vec<_>>()
        });
        let path = format!("{instance}/offsets");
        let result = async {
            let resp = send_with_retry(&self.retry, "kafka committed offsets", || {
                self.request(Method::GET, &path)
                    .header(CONTENT_TYPE, KAFKA_V2)
                    .json(&body)
            })
            .await?;
            let text = expect_success(resp, "kafka committed offsets").await?;
            parse_json::<CommittedList>(&text, "kafka committed offsets")
        }
        .await;
        self.close_consumer(&instance).await;
        Ok(result?
            .offsets
            .into_iter()
            .filter(|e| e.offset >= 0)
            .map(|e| (e.partition, e.offset as u64))
            .collect())
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        max: usize,
    ) -> Result<Vec<TopicMessage>, PlatformError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let group = format!("medallion-browser-{}", uuid::Uuid::new_v4().simple());
        let instance = self.open_consumer(&group).await?;
        let result = self
            .read_partition(&instance, topic, partition, offset, max)
            .await;
        self.close_consumer(&instance).await;
        result
    }

    async fn produce(&self, topic: &str, values: &[Value]) -> Result<usize, PlatformError> {
        if values.is_empty() {
            return Ok(0);
        }
        let path = format!("/topics/{topic}");
        let body = json!({
            "records": values.iter().map(|v| json!({"value": v})).collect::<Vec<_>>()
        });
        let resp = send_with_retry(&self.retry, "kafka produce", || {
            self.request(Method::POST, &path)
                .header(CONTENT_TYPE, KAFKA_JSON_V2)
                .json(&body)
        })
        .await?;
        let text = expect_success(resp, "kafka produce").await?;
        let produced: ProduceResponse = parse_json(&text, "kafka produce")?;
        let failed: Vec<&ProduceOffset> = produced
            .offsets
            .iter()
            .filter(|o| o.error_code.is_some_and(|c| c != 0))
            .collect();
        if let Some(first) = failed.first() {
            warn!(topic, failed = failed.len(), "kafka rejected records");
            if failed.len() == values.len() {
                return Err(PlatformError::new(
                    PlatformErrorCode::Upstream,
                    format!(
                        "kafka produce: {}",
                        first.error.clone().unwrap_or_else(|| "all records rejected".into())
                    ),
                ));
            }
        }
        Ok(values.len() - failed.len())
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        offsets: &CommittedOffsets,
    ) -> Result<(), PlatformError> {
        if offsets.is_empty() {
            return Ok(());
        }
        // The proxy commits `offset + 1` of what it is sent, so the wire carries
        // the last consumed offset while `offsets` holds the next one to read.
        let entries: Vec<Value> = offsets
            .iter()
            .filter_map(|(partition, next)| {
                next.checked_sub(1).map(|last| {
                    json!({"topic": topic, "partition": partition, "offset": last})
                })
            })
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        let instance = self.open_consumer(group).await?;
        let body = json!({ "offsets": entries });
        let result = self
            .post_instance(&instance, "offsets", &body, "kafka commit")
            .await;
        self.close_consumer(&instance).await;
        result
    }
}
