// SPDX-License-Identifier: Apache-2.0

//! In-memory platform clients for tests and offline runs.

use crate::catalog::{new_snapshot_id, project_row, TableCatalog};
use crate::error::{PlatformError, PlatformErrorCode};
use crate::event_stream::{record_timestamp, CommittedOffsets, EventStream, PartitionOffsets};
use crate::probe::{ProbeTarget, Prober};
use crate::s3::ObjectStore;
use async_trait::async_trait;
use medallion_model::{
    BucketSummary, ObjectSummary, PortProbe, ProvisionStatus, TableIdent, TableMetrics,
    TableSchema, TableSummary, TopicMessage, TopicSummary,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Shared failure switch: when set, every call returns the stored error.
#[derive(Default)]
struct FailureSwitch(Mutex<Option<PlatformError>>);

impl FailureSwitch {
    async fn check(&self) -> Result<(), PlatformError> {
        match self.0.lock().await.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn set(&self, err: Option<PlatformError>) {
        *self.0.lock().await = err;
    }
}

#[derive(Default)]
pub struct FakeObjectStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, (Vec<u8>, String)>>>,
    failure: FailureSwitch,
}

impl FakeObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_with(&self, err: Option<PlatformError>) {
        self.failure.set(err).await;
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn probe(&self) -> Result<(), PlatformError> {
        self.failure.check().await
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, PlatformError> {
        self.failure.check().await?;
        Ok(self
            .buckets
            .lock()
            .await
            .keys()
            .map(|name| BucketSummary {
                name: name.clone(),
                creation_date: None,
            })
            .collect())
    }

    async fn create_bucket(&self, name: &str) -> Result<ProvisionStatus, PlatformError> {
        self.failure.check().await?;
        let mut buckets = self.buckets.lock().await;
        if buckets.contains_key(name) {
            return Ok(ProvisionStatus::Skipped);
        }
        buckets.insert(name.to_string(), BTreeMap::new());
        Ok(ProvisionStatus::Created)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectSummary>, PlatformError> {
        self.failure.check().await?;
        let buckets = self.buckets.lock().await;
        let objects = buckets.get(bucket).ok_or_else(|| {
            PlatformError::new(PlatformErrorCode::NotFound, format!("bucket not found: {bucket}"))
        })?;
        Ok(objects
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, (body, modified))| ObjectSummary {
                key: key.clone(),
                size: body.len() as u64,
                last_modified: Some(modified.clone()),
            })
            .collect())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), PlatformError> {
        self.failure.check().await?;
        let mut buckets = self.buckets.lock().await;
        let objects = buckets.get_mut(bucket).ok_or_else(|| {
            PlatformError::new(PlatformErrorCode::NotFound, format!("bucket not found: {bucket}"))
        })?;
        objects.insert(key.to_string(), (body, now_rfc3339()));
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PlatformError> {
        self.failure.check().await?;
        self.buckets
            .lock()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|(body, _)| body.clone())
            .ok_or_else(|| {
                PlatformError::new(PlatformErrorCode::NotFound, format!("object not found: {bucket}/{key}"))
            })
    }
}

#[derive(Default)]
struct StreamState {
    topics: BTreeMap<String, Vec<Vec<TopicMessage>>>,
    committed: BTreeMap<(String, String), CommittedOffsets>,
}

/// Single-broker topic log; records are appended to partition 0.
#[derive(Default)]
pub struct FakeEventStream {
    state: Mutex<StreamState>,
    failure: FailureSwitch,
}

impl FakeEventStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_topic(&self, name: &str, partitions: u32) {
        self.state
            .lock()
            .await
            .topics
            .entry(name.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions.max(1) as usize]);
    }

    pub async fn fail_with(&self, err: Option<PlatformError>) {
        self.failure.set(err).await;
    }
}

#[async_trait]
impl EventStream for FakeEventStream {
    async fn probe(&self) -> Result<(), PlatformError> {
        self.failure.check().await
    }

    async fn list_topics(&self) -> Result<Vec<TopicSummary>, PlatformError> {
        self.failure.check().await?;
        Ok(self
            .state
            .lock()
            .await
            .topics
            .iter()
            .map(|(name, parts)| TopicSummary {
                name: name.clone(),
                partitions: parts.len() as u32,
            })
            .collect())
    }

    async fn create_topic(
        &self,
        name: &str,
        partitions: u32,
        _replication: u16,
    ) -> Result<ProvisionStatus, PlatformError> {
        self.failure.check().await?;
        let mut state = self.state.lock().await;
        if state.topics.contains_key(name) {
            return Ok(ProvisionStatus::Skipped);
        }
        state
            .topics
            .insert(name.to_string(), vec![Vec::new(); partitions.max(1) as usize]);
        Ok(ProvisionStatus::Created)
    }

    async fn partition_offsets(&self, topic: &str) -> Result<Vec<PartitionOffsets>, PlatformError> {
        self.failure.check().await?;
        let state = self.state.lock().await;
        Ok(state
            .topics
            .get(topic)
            .map(|parts| {
                parts
                    .iter()
                    .zip(0_u32..)
                    .map(|(records, partition)| PartitionOffsets {
                        partition,
                        beginning: 0,
                        end: records.len() as u64,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn committed_offsets(
        &self,
        group: &str,
        topic: &str,
    ) -> Result<CommittedOffsets, PlatformError> {
        self.failure.check().await?;
        let state = self.state.lock().await;
        Ok(state
            .committed
            .get(&(group.to_string(), topic.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        max: usize,
    ) -> Result<Vec<TopicMessage>, PlatformError> {
        self.failure.check().await?;
        let state = self.state.lock().await;
        Ok(state
            .topics
            .get(topic)
            .and_then(|parts| parts.get(partition as usize))
            .map(|records| {
                records
                    .iter()
                    .skip(offset as usize)
                    .take(max)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn produce(&self, topic: &str, values: &[Value]) -> Result<usize, PlatformError> {
        self.failure.check().await?;
        let mut state = self.state.lock().await;
        let log = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new()]);
        let partition = &mut log[0];
        for value in values {
            let timestamp = record_timestamp(None, value).or_else(|| Some(now_rfc3339()));
            partition.push(TopicMessage {
                partition: 0,
                offset: partition.len() as u64,
                timestamp,
                value: value.clone(),
            });
        }
        Ok(values.len())
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        offsets: &CommittedOffsets,
    ) -> Result<(), PlatformError> {
        self.failure.check().await?;
        let mut state = self.state.lock().await;
        let entry = state
            .committed
            .entry((group.to_string(), topic.to_string()))
            .or_default();
        for (partition, offset) in offsets {
            entry.insert(*partition, *offset);
        }
        Ok(())
    }
}

struct FakeTable {
    schema: TableSchema,
    rows: Vec<Value>,
    snapshots: Vec<i64>,
    last_updated: Option<String>,
}

#[derive(Default)]
pub struct FakeCatalog {
    tables: Mutex<BTreeMap<String, FakeTable>>,
    failure: FailureSwitch,
}

impl FakeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_with(&self, err: Option<PlatformError>) {
        self.failure.set(err).await;
    }

    fn missing(ident: &TableIdent) -> PlatformError {
        PlatformError::new(PlatformErrorCode::NotFound, format!("table not found: {ident}"))
    }
}

#[async_trait]
impl TableCatalog for FakeCatalog {
    async fn list_tables(&self) -> Result<Vec<TableSummary>, PlatformError> {
        self.failure.check().await?;
        Ok(self
            .tables
            .lock()
            .await
            .keys()
            .map(|name| TableSummary { name: name.clone() })
            .collect())
    }

    async fn create_table(
        &self,
        ident: &TableIdent,
        schema: &TableSchema,
        _location: &str,
    ) -> Result<ProvisionStatus, PlatformError> {
        self.failure.check().await?;
        let mut tables = self.tables.lock().await;
        let key = ident.to_string();
        if tables.contains_key(&key) {
            return Ok(ProvisionStatus::Skipped);
        }
        tables.insert(
            key,
            FakeTable {
                schema: schema.clone(),
                rows: Vec::new(),
                snapshots: Vec::new(),
                last_updated: None,
            },
        );
        Ok(ProvisionStatus::Created)
    }

    async fn append(&self, ident: &TableIdent, rows: &[Value]) -> Result<u64, PlatformError> {
        self.failure.check().await?;
        let mut tables = self.tables.lock().await;
        let table = tables
            .get_mut(&ident.to_string())
            .ok_or_else(|| Self::missing(ident))?;
        if rows.is_empty() {
            return Ok(0);
        }
        let schema = table.schema.clone();
        table
            .rows
            .extend(rows.iter().map(|row| project_row(&schema, row)));
        table.snapshots.push(new_snapshot_id());
        table.last_updated = Some(now_rfc3339());
        Ok(rows.len() as u64)
    }

    async fn scan(&self, ident: &TableIdent) -> Result<Vec<Value>, PlatformError> {
        self.failure.check().await?;
        self.tables
            .lock()
            .await
            .get(&ident.to_string())
            .map(|t| t.rows.clone())
            .ok_or_else(|| Self::missing(ident))
    }

    async fn metrics(&self, ident: &TableIdent) -> Result<TableMetrics, PlatformError> {
        self.failure.check().await?;
        let tables = self.tables.lock().await;
        let table = tables
            .get(&ident.to_string())
            .ok_or_else(|| Self::missing(ident))?;
        Ok(TableMetrics {
            name: ident.to_string(),
            record_count: table.rows.len() as u64,
            snapshot_count: table.snapshots.len() as u64,
            current_snapshot_id: table.snapshots.last().copied(),
            last_updated: table.last_updated.clone(),
        })
    }
}

/// Answers probes from a fixed table keyed by port; unknown ports are unreachable.
#[derive(Default)]
pub struct FakeProber {
    answers: BTreeMap<u16, PortProbe>,
}

impl FakeProber {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, port: u16, probe: PortProbe) -> Self {
        self.answers.insert(port, probe);
        self
    }

    /// Every platform service answers `200`.
    #[must_use]
    pub fn all_available() -> Self {
        medallion_model::PLATFORM_SERVICES
            .iter()
            .fold(Self::new(), |prober, svc| prober.with(svc.port, PortProbe::responded(200)))
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, target: &ProbeTarget) -> PortProbe {
        self.answers
            .get(&target.port)
            .cloned()
            .unwrap_or_else(|| PortProbe::unreachable("TCP connection refused"))
    }
}
