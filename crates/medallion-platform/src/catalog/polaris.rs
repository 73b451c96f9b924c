// SPDX-License-Identifier: Apache-2.0

use super::{new_snapshot_id, project_row, TableCatalog};
use crate::error::{PlatformError, PlatformErrorCode};
use crate::http::{expect_success, parse_json, send_with_retry};
use crate::retry::RetryPolicy;
use crate::s3::ObjectStore;
use async_trait::async_trait;
use medallion_model::{
    PolarisCredentials, ProvisionStatus, TableIdent, TableMetrics, TableSchema, TableSummary,
};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const TOKEN_SCOPE: &str = "PRINCIPAL_ROLE:ALL";
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PolarisConfig {
    /// `{scheme}://{host}:{catalog_port}`
    pub endpoint: String,
    pub catalog_name: String,
    pub credentials: PolarisCredentials,
    pub default_location: String,
    pub allowed_locations: Vec<String>,
    pub region: String,
}

impl PolarisConfig {
    #[must_use]
    pub fn new(endpoint: &str, catalog_name: &str, credentials: PolarisCredentials) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            catalog_name: catalog_name.to_string(),
            credentials,
            default_location: "s3://gold-bucket/iceberg/".to_string(),
            allowed_locations: vec![
                "s3://gold-bucket/iceberg/".to_string(),
                "s3://silver-bucket/iceberg/".to_string(),
            ],
            region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct NamespaceList {
    #[serde(default)]
    namespaces: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TableIdentifier {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableList {
    #[serde(default)]
    identifiers: Vec<TableIdentifier>,
}

/// Iceberg REST catalog served by Polaris. Table metadata lives in the catalog;
/// appended rows are written as JSON-lines objects below the table location.
pub struct PolarisCatalog {
    client: Client,
    config: PolarisConfig,
    objects: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    token: Mutex<Option<CachedToken>>,
    catalog_ready: Mutex<bool>,
}

impl PolarisCatalog {
    #[must_use]
    pub fn new(client: Client, config: PolarisConfig, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            client,
            config,
            objects,
            retry: RetryPolicy::default(),
            token: Mutex::new(None),
            catalog_ready: Mutex::new(false),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn bearer(&self) -> Result<String, PlatformError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }
        let creds = &self.config.credentials;
        let url = format!("{}/api/catalog/v1/oauth/tokens", self.config.endpoint);
        let form = [("grant_type", "client_credentials"), ("scope", TOKEN_SCOPE)];
        let resp = send_with_retry(&self.retry, "polaris token", || {
            self.client
                .post(&url)
                .basic_auth(&creds.client_id, Some(&creds.client_secret))
                .form(&form)
        })
        .await?;
        let body = expect_success(resp, "polaris token").await?;
        let token: TokenResponse = parse_json(&body, "polaris token")?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at,
        });
        debug!(realm = %creds.realm, "polaris token refreshed");
        Ok(token.access_token)
    }

    /// Sends an authenticated catalog request; returns status and body.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        context: &str,
    ) -> Result<(u16, String), PlatformError> {
        let token = self.bearer().await?;
        let url = format!("{}{path}", self.config.endpoint);
        let resp = send_with_retry(&self.retry, context, || {
            let builder = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .header("Polaris-Realm", &self.config.credentials.realm)
                .header(reqwest::header::ACCEPT, "application/json");
            match body {
                Some(b) => builder.json(b),
                None => builder,
            }
        })
        .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(PlatformError::network)?;
        Ok((status, text))
    }

    fn catalog_path(&self, suffix: &str) -> String {
        format!("/api/catalog/v1/{}{suffix}", self.config.catalog_name)
    }

    async fn ensure_catalog(&self) -> Result<(), PlatformError> {
        let mut ready = self.catalog_ready.lock().await;
        if *ready {
            return Ok(());
        }
        let name = &self.config.catalog_name;
        let path = format!("/api/management/v1/catalogs/{name}");
        let (status, body) = self.call(Method::GET, &path, None, "polaris get catalog").await?;
        match status {
            200..=299 => {}
            404 => {
                let payload = json!({
                    "catalog": {
                        "name": name,
                        "type": "INTERNAL",
                        "properties": {"default-base-location": self.config.default_location},
                        "storageConfigInfo": {
                            "storageType": "S3",
                            "allowedLocations": self.config.allowed_locations,
                            "region": self.config.region,
                        }
                    }
                });
                let (status, body) = self
                    .call(
                        Method::POST,
                        "/api/management/v1/catalogs",
                        Some(&payload),
                        "polaris create catalog",
                    )
                    .await?;
                if !(200..300).contains(&status) && status != 409 {
                    return Err(PlatformError::from_status(status, "polaris create catalog", &body));
                }
                info!(catalog = %name, "polaris catalog created");
            }
            _ => return Err(PlatformError::from_status(status, "polaris get catalog", &body)),
        }
        *ready = true;
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), PlatformError> {
        let path = self.catalog_path(&format!("/namespaces/{namespace}"));
        let (status, body) = self.call(Method::GET, &path, None, "polaris get namespace").await?;
        match status {
            200..=299 => Ok(()),
            404 => {
                let payload = json!({"namespace": [namespace], "properties": {}});
                let (status, body) = self
                    .call(
                        Method::POST,
                        &self.catalog_path("/namespaces"),
                        Some(&payload),
                        "polaris create namespace",
                    )
                    .await?;
                if (200..300).contains(&status) || status == 409 {
                    info!(namespace, "polaris namespace created");
                    Ok(())
                } else {
                    Err(PlatformError::from_status(status, "polaris create namespace", &body))
                }
            }
            _ => Err(PlatformError::from_status(status, "polaris get namespace", &body)),
        }
    }

    async fn load_table(&self, ident: &TableIdent) -> Result<Value, PlatformError> {
        let path = self.catalog_path(&format!(
            "/namespaces/{}/tables/{}",
            ident.namespace, ident.name
        ));
        let (status, body) = self.call(Method::GET, &path, None, "polaris load table").await?;
        if status == 404 {
            return Err(PlatformError::new(
                PlatformErrorCode::NotFound,
                format!("table not found: {ident}"),
            ));
        }
        if !(200..300).contains(&status) {
            return Err(PlatformError::from_status(status, "polaris load table", &body));
        }
        parse_json(&body, "polaris load table")
    }

    async fn data_prefix(&self, ident: &TableIdent) -> Result<(String, String), PlatformError> {
        let table = self.load_table(ident).await?;
        let location = table["metadata"]["location"]
            .as_str()
            .or_else(|| table["metadata-location"].as_str())
            .ok_or_else(|| PlatformError::upstream(format!("table {ident} has no location")))?;
        let (bucket, prefix) = split_s3_location(location).ok_or_else(|| {
            PlatformError::new(
                PlatformErrorCode::Unsupported,
                format!("table location is not in the object store: {location}"),
            )
        })?;
        Ok((bucket, format!("{prefix}data/")))
    }

    async fn schema_of(&self, ident: &TableIdent) -> Result<TableSchema, PlatformError> {
        let table = self.load_table(ident).await?;
        Ok(schema_from_metadata(&table["metadata"]))
    }
}

/// `s3://bucket/a/b` -> (`bucket`, `a/b/`).
pub(crate) fn split_s3_location(location: &str) -> Option<(String, String)> {
    let rest = location
        .strip_prefix("s3://")
        .or_else(|| location.strip_prefix("s3a://"))?;
    let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return None;
    }
    let path = path.trim_matches('/');
    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };
    Some((bucket.to_string(), prefix))
}

fn schema_from_metadata(metadata: &Value) -> TableSchema {
    let current = metadata["current-schema-id"].as_i64().unwrap_or(0);
    let schema = metadata["schemas"]
        .as_array()
        .and_then(|all| {
            all.iter()
                .find(|s| s["schema-id"].as_i64().unwrap_or(0) == current)
        })
        .or_else(|| metadata.get("schema"))
        .cloned()
        .unwrap_or(Value::Null);
    let fields = schema["fields"].as_array().cloned().unwrap_or_default();
    TableSchema {
        fields: fields
            .iter()
            .filter_map(|f| serde_json::from_value::<IcebergField>(f.clone()).ok())
            .filter_map(|f| {
                let field_type = serde_json::from_value(Value::String(f.field_type)).ok()?;
                Some(medallion_model::SchemaField {
                    id: f.id,
                    name: f.name,
                    field_type,
                    required: f.required,
                })
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
struct IcebergField {
    id: u32,
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    required: bool,
}

/// Metrics from Iceberg table metadata: snapshot list, current snapshot summary.
pub(crate) fn metrics_from_metadata(name: &str, metadata: &Value) -> TableMetrics {
    let snapshots = metadata["snapshots"].as_array().cloned().unwrap_or_default();
    let current = metadata["current-snapshot-id"].as_i64().filter(|id| *id > 0);
    let record_count = current
        .and_then(|id| snapshots.iter().find(|s| s["snapshot-id"].as_i64() == Some(id)))
        .and_then(|s| s["summary"]["total-records"].as_str())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    let last_updated = metadata["last-updated-ms"]
        .as_i64()
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|ts| ts.to_rfc3339());
    TableMetrics {
        name: name.to_string(),
        record_count,
        snapshot_count: snapshots.len() as u64,
        current_snapshot_id: current,
        last_updated,
    }
}

#[async_trait]
impl TableCatalog for PolarisCatalog {
    async fn list_tables(&self) -> Result<Vec<TableSummary>, PlatformError> {
        self.ensure_catalog().await?;
        let (status, body) = self
            .call(
                Method::GET,
                &self.catalog_path("/namespaces"),
                None,
                "polaris list namespaces",
            )
            .await?;
        if !(200..300).contains(&status) {
            return Err(PlatformError::from_status(status, "polaris list namespaces", &body));
        }
        let namespaces: NamespaceList = parse_json(&body, "polaris list namespaces")?;
        let mut out = Vec::new();
        for ns in namespaces.namespaces {
            let ns = ns.join(".");
            let path = self.catalog_path(&format!("/namespaces/{ns}/tables"));
            let (status, body) = self.call(Method::GET, &path, None, "polaris list tables").await?;
            if !(200..300).contains(&status) {
                debug!(namespace = %ns, status, "polaris namespace tables unavailable");
                continue;
            }
            let tables: TableList = parse_json(&body, "polaris list tables")?;
            out.extend(tables.identifiers.into_iter().map(|t| TableSummary {
                name: format!("{ns}.{}", t.name),
            }));
        }
        Ok(out)
    }

    async fn create_table(
        &self,
        ident: &TableIdent,
        schema: &TableSchema,
        location: &str,
    ) -> Result<ProvisionStatus, PlatformError> {
        self.ensure_catalog().await?;
        self.ensure_namespace(&ident.namespace).await?;
        match self.load_table(ident).await {
            Ok(_) => return Ok(ProvisionStatus::Skipped),
            Err(err) if err.code == PlatformErrorCode::NotFound => {}
            Err(err) => return Err(err),
        }
        let payload = json!({
            "name": ident.name,
            "schema": schema.to_iceberg_json(),
            "location": location,
        });
        let path = self.catalog_path(&format!("/namespaces/{}/tables", ident.namespace));
        let (status, body) = self
            .call(Method::POST, &path, Some(&payload), "polaris create table")
            .await?;
        match status {
            200..=299 => {
                info!(table = %ident, location, "polaris table created");
                Ok(ProvisionStatus::Created)
            }
            409 => Ok(ProvisionStatus::Skipped),
            _ => Err(PlatformError::from_status(status, "polaris create table", &body)),
        }
    }

    async fn append(&self, ident: &TableIdent, rows: &[Value]) -> Result<u64, PlatformError> {
        let schema = self.schema_of(ident).await?;
        if rows.is_empty() {
            return Ok(0);
        }
        let (bucket, prefix) = self.data_prefix(ident).await?;
        let mut body = String::new();
        for row in rows {
            let projected = if schema.fields.is_empty() {
                row.clone()
            } else {
                project_row(&schema, row)
            };
            body.push_str(&projected.to_string());
            body.push('\n');
        }
        let key = format!(
            "{prefix}{}-{}.jsonl",
            chrono::Utc::now().timestamp_millis(),
            new_snapshot_id()
        );
        self.objects
            .put_object(&bucket, &key, body.into_bytes(), "application/x-ndjson")
            .await?;
        debug!(table = %ident, bucket, key, rows = rows.len(), "data file written");
        Ok(rows.len() as u64)
    }

    async fn scan(&self, ident: &TableIdent) -> Result<Vec<Value>, PlatformError> {
        let (bucket, prefix) = self.data_prefix(ident).await?;
        let mut files = self.objects.list_objects(&bucket, Some(&prefix)).await?;
        files.sort_by(|a, b| a.key.cmp(&b.key));
        let mut rows = Vec::new();
        for file in files.iter().filter(|f| f.key.ends_with(".jsonl")) {
            let bytes = self.objects.get_object(&bucket, &file.key).await?;
            for line in String::from_utf8_lossy(&bytes).lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(v) => rows.push(v),
                    Err(err) => debug!(key = %file.key, error = %err, "skipping malformed row"),
                }
            }
        }
        Ok(rows)
    }

    async fn metrics(&self, ident: &TableIdent) -> Result<TableMetrics, PlatformError> {
        let table = self.load_table(ident).await?;
        let mut metrics = metrics_from_metadata(&ident.to_string(), &table["metadata"]);
        if metrics.snapshot_count == 0 {
            // Rows written as data files only; report them as one snapshot per file.
            let (bucket, prefix) = self.data_prefix(ident).await?;
            let files = self.objects.list_objects(&bucket, Some(&prefix)).await?;
            metrics.snapshot_count = files.len() as u64;
            metrics.record_count = self.scan(ident).await?.len() as u64;
            if let Some(latest) = files.iter().filter_map(|f| f.last_modified.clone()).max() {
                metrics.last_updated = Some(latest);
            }
        }
        Ok(metrics)
    }
}
