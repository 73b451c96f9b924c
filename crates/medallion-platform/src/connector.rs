// SPDX-License-Identifier: Apache-2.0

use crate::catalog::TableCatalog;
use crate::error::PlatformErrorCode;
use crate::event_stream::EventStream;
use crate::probe::{ProbeTarget, Prober};
use crate::s3::ObjectStore;
use medallion_model::{
    AuthStatus, ConnectionTestResult, DiscoveryReport, PortProbe, ServiceDetail,
    PLATFORM_SERVICES, REST_API_PORT,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

const OBJECT_STORE: &str = "Object Store";

/// Clients for one cluster, bound to the credentials of a connection profile.
#[derive(Clone)]
pub struct PlatformConnector {
    pub cluster_host: String,
    username: Option<String>,
    password: Option<String>,
    prober: Arc<dyn Prober>,
    pub objects: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventStream>,
    pub catalog: Arc<dyn TableCatalog>,
}

impl PlatformConnector {
    #[must_use]
    pub fn new(
        cluster_host: &str,
        username: Option<String>,
        password: Option<String>,
        prober: Arc<dyn Prober>,
        objects: Arc<dyn ObjectStore>,
        events: Arc<dyn EventStream>,
        catalog: Arc<dyn TableCatalog>,
    ) -> Self {
        Self {
            cluster_host: cluster_host.trim().to_string(),
            username,
            password,
            prober,
            objects,
            events,
            catalog,
        }
    }

    fn target(&self, port: u16) -> ProbeTarget {
        ProbeTarget {
            host: self.cluster_host.clone(),
            port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Authenticated probe of the platform REST API.
    pub async fn test_connection(&self) -> ConnectionTestResult {
        let probe = self.prober.probe(&self.target(REST_API_PORT)).await;
        debug!(host = %self.cluster_host, auth = probe.auth_status.as_str(), "connection test");
        ConnectionTestResult::from_rest_probe(&self.cluster_host, &probe)
    }

    async fn object_store_probe(objects: &dyn ObjectStore) -> PortProbe {
        match objects.probe().await {
            Ok(()) => PortProbe {
                tcp_available: true,
                https_available: true,
                auth_status: AuthStatus::Success,
                status_code: Some(200),
                error: None,
            },
            Err(err) if err.code == PlatformErrorCode::Unauthorized => PortProbe {
                tcp_available: true,
                https_available: true,
                auth_status: AuthStatus::Unauthorized,
                status_code: Some(403),
                error: Some(format!("S3 error: {}", err.message)),
            },
            Err(err) => PortProbe::unreachable(format!("S3 error: {}", err.message)),
        }
    }

    /// Probes every platform service concurrently. The object store is checked
    /// with a signed bucket listing instead of a bare HTTPS request.
    pub async fn discover_services(&self) -> DiscoveryReport {
        let mut tasks = JoinSet::new();
        for (index, service) in PLATFORM_SERVICES.iter().enumerate() {
            let prober = Arc::clone(&self.prober);
            let objects = Arc::clone(&self.objects);
            let target = self.target(service.port);
            let is_object_store = service.description == OBJECT_STORE;
            tasks.spawn(async move {
                let probe = if is_object_store {
                    Self::object_store_probe(objects.as_ref()).await
                } else {
                    prober.probe(&target).await
                };
                (index, probe)
            });
        }

        let mut probes: Vec<Option<PortProbe>> = vec![None; PLATFORM_SERVICES.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, probe)) => probes[index] = Some(probe),
                Err(err) => warn!(error = %err, "service probe task failed"),
            }
        }
        let details = PLATFORM_SERVICES
            .iter()
            .zip(probes)
            .map(|(service, probe)| {
                let probe =
                    probe.unwrap_or_else(|| PortProbe::unreachable("probe task did not complete"));
                ServiceDetail::from_probe(service, probe)
            })
            .collect();
        DiscoveryReport::from_details(&self.cluster_host, details)
    }
}
