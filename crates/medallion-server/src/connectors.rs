// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use medallion_model::{
    ConnectionProfile, PolarisCredentials, ProvisionStatus, S3Credentials, TableIdent,
    TableMetrics, TableSchema, TableSummary,
};
use medallion_platform::fake::{FakeCatalog, FakeEventStream, FakeObjectStore, FakeProber};
use medallion_platform::{
    build_client, generate_temp_keys, resolve_s3_keys, CatalogBackend, KafkaRestClient,
    NetworkProber, ObjectStore, PlatformConnector, PlatformError, PlatformErrorCode,
    PlatformSettings, PolarisCatalog, PolarisConfig, Prober, S3Client, SqliteCatalog,
    TableCatalog,
};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Platform clients bound to one profile, plus any S3 keys generated on the way.
pub struct Connected {
    pub connector: PlatformConnector,
    /// New temporary keys that should be written back to the profile.
    pub refreshed_keys: Option<S3Credentials>,
}

#[async_trait]
pub trait ConnectorFactory: Send + Sync + 'static {
    fn mode(&self) -> &'static str;
    async fn connect(&self, profile: &ConnectionProfile) -> Result<Connected, PlatformError>;
    async fn generate_s3_keys(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<S3Credentials, PlatformError>;
}

/// Stand-in catalog when the Polaris backend is selected but the profile
/// carries no usable principal credentials.
struct UnavailableCatalog {
    reason: String,
}

impl UnavailableCatalog {
    fn error(&self) -> PlatformError {
        PlatformError::new(PlatformErrorCode::Validation, self.reason.clone())
    }
}

#[async_trait]
impl TableCatalog for UnavailableCatalog {
    async fn list_tables(&self) -> Result<Vec<TableSummary>, PlatformError> {
        Err(self.error())
    }

    async fn create_table(
        &self,
        _ident: &TableIdent,
        _schema: &TableSchema,
        _location: &str,
    ) -> Result<ProvisionStatus, PlatformError> {
        Err(self.error())
    }

    async fn append(&self, _ident: &TableIdent, _rows: &[Value]) -> Result<u64, PlatformError> {
        Err(self.error())
    }

    async fn scan(&self, _ident: &TableIdent) -> Result<Vec<Value>, PlatformError> {
        Err(self.error())
    }

    async fn metrics(&self, _ident: &TableIdent) -> Result<TableMetrics, PlatformError> {
        Err(self.error())
    }
}

/// Talks to the cluster named by the profile.
pub struct LiveConnectorFactory {
    settings: PlatformSettings,
    client: Client,
    local_catalog: Option<Arc<SqliteCatalog>>,
}

impl LiveConnectorFactory {
    pub fn new(settings: PlatformSettings) -> Result<Self, PlatformError> {
        settings
            .validate()
            .map_err(|e| PlatformError::new(PlatformErrorCode::Validation, e))?;
        let client = build_client(&settings)?;
        let local_catalog = match &settings.catalog {
            CatalogBackend::Local { path } => Some(Arc::new(SqliteCatalog::open(path)?)),
            CatalogBackend::Polaris => None,
        };
        Ok(Self {
            settings,
            client,
            local_catalog,
        })
    }

    fn catalog_for(
        &self,
        profile: &ConnectionProfile,
        objects: Arc<dyn ObjectStore>,
    ) -> Arc<dyn TableCatalog> {
        if let Some(local) = &self.local_catalog {
            return Arc::clone(local) as Arc<dyn TableCatalog>;
        }
        let raw = profile.polaris_credentials.as_deref().unwrap_or("");
        match PolarisCredentials::parse(raw) {
            Ok(credentials) => {
                let endpoint = self
                    .settings
                    .base_url(&profile.cluster_host, self.settings.catalog_port);
                let config =
                    PolarisConfig::new(&endpoint, &self.settings.catalog_name, credentials);
                Arc::new(
                    PolarisCatalog::new(self.client.clone(), config, objects)
                        .with_retry(self.settings.retry.clone()),
                )
            }
            Err(err) => {
                debug!(error = %err, "polaris credentials unusable");
                Arc::new(UnavailableCatalog {
                    reason: format!("Polaris credentials are not configured: {err}"),
                })
            }
        }
    }
}

#[async_trait]
impl ConnectorFactory for LiveConnectorFactory {
    fn mode(&self) -> &'static str {
        "live"
    }

    async fn connect(&self, profile: &ConnectionProfile) -> Result<Connected, PlatformError> {
        let host = profile.cluster_host.trim();
        if host.is_empty() {
            return Err(PlatformError::new(
                PlatformErrorCode::Validation,
                "cluster host is empty",
            ));
        }
        let now_ms = Utc::now().timestamp_millis();
        let keys = resolve_s3_keys(&self.client, &self.settings, profile, now_ms).await;
        let objects: Arc<dyn ObjectStore> = Arc::new(
            S3Client::new(
                self.client.clone(),
                &self.settings.base_url(host, self.settings.s3_port),
                &keys.access_key,
                &keys.secret_key,
            )
            .with_region(&self.settings.s3_region)
            .with_retry(self.settings.retry.clone()),
        );
        let events = Arc::new(
            KafkaRestClient::new(
                self.client.clone(),
                &self.settings.base_url(host, self.settings.kafka_rest_port),
                profile.username_or_empty(),
                profile.password_or_empty(),
            )
            .with_retry(self.settings.retry.clone()),
        );
        let catalog = self.catalog_for(profile, Arc::clone(&objects));
        let prober: Arc<dyn Prober> = Arc::new(NetworkProber::new(
            self.client.clone(),
            &self.settings.scheme,
            self.settings.probe_timeout,
        ));
        Ok(Connected {
            connector: PlatformConnector::new(
                host,
                profile.username.clone(),
                profile.password.clone(),
                prober,
                objects,
                events,
                catalog,
            ),
            refreshed_keys: keys.refreshed,
        })
    }

    async fn generate_s3_keys(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<S3Credentials, PlatformError> {
        generate_temp_keys(&self.client, &self.settings, profile).await
    }
}

/// In-memory platform for tests and offline demos. Every connection shares
/// the same stores, so state persists across requests.
pub struct FakeConnectorFactory {
    pub objects: Arc<FakeObjectStore>,
    pub events: Arc<FakeEventStream>,
    pub catalog: Arc<FakeCatalog>,
    prober: Arc<dyn Prober>,
}

impl Default for FakeConnectorFactory {
    fn default() -> Self {
        Self::with_prober(FakeProber::all_available())
    }
}

impl FakeConnectorFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prober(prober: FakeProber) -> Self {
        Self {
            objects: Arc::new(FakeObjectStore::new()),
            events: Arc::new(FakeEventStream::new()),
            catalog: Arc::new(FakeCatalog::new()),
            prober: Arc::new(prober),
        }
    }
}

#[async_trait]
impl ConnectorFactory for FakeConnectorFactory {
    fn mode(&self) -> &'static str {
        "fake"
    }

    async fn connect(&self, profile: &ConnectionProfile) -> Result<Connected, PlatformError> {
        Ok(Connected {
            connector: PlatformConnector::new(
                &profile.cluster_host,
                profile.username.clone(),
                profile.password.clone(),
                Arc::clone(&self.prober),
                Arc::clone(&self.objects) as Arc<dyn ObjectStore>,
                Arc::clone(&self.events) as Arc<dyn medallion_platform::EventStream>,
                Arc::clone(&self.catalog) as Arc<dyn TableCatalog>,
            ),
            refreshed_keys: None,
        })
    }

    async fn generate_s3_keys(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<S3Credentials, PlatformError> {
        if profile.username_or_empty().is_empty() {
            warn!("fake key generation without a username");
        }
        Ok(S3Credentials {
            access_key: format!("FAKE-{}", profile.username_or_empty()),
            secret_key: "fake-secret".to_string(),
            expiry_time: (Utc::now() + ChronoDuration::minutes(15)).timestamp_millis(),
        })
    }
}
