// SPDX-License-Identifier: Apache-2.0

use super::{connect_configured, ServiceError};
use crate::AppState;
use medallion_model::{ConnectionTestResult, DiscoveryReport, ProfileUpdate, ReadinessScore};
use tracing::info;

pub(crate) const NO_CONFIGURATION: &str =
    "No configuration found. Please save settings or provide them in the request.";
pub(crate) const CLUSTER_HOST_REQUIRED: &str =
    "Cluster Host is required. Please verify your configuration.";

/// Tests the REST API with the settings in the request body, or with the
/// stored profile when the body is absent. Nothing is persisted.
pub(crate) async fn test_connection(
    state: &AppState,
    candidate: Option<ProfileUpdate>,
) -> Result<ConnectionTestResult, ServiceError> {
    let profile = match candidate {
        Some(update) => {
            if update.cluster_host_trimmed().is_none() {
                return Err(ServiceError::Invalid(CLUSTER_HOST_REQUIRED.to_string()));
            }
            update.into_transient_profile()
        }
        None => {
            let stored = state
                .db
                .load_profile()?
                .filter(|p| p.configured)
                .ok_or_else(|| ServiceError::Invalid(NO_CONFIGURATION.to_string()))?;
            if stored.cluster_host.trim().is_empty() {
                return Err(ServiceError::Invalid(CLUSTER_HOST_REQUIRED.to_string()));
            }
            stored
        }
    };
    let connected = state.connectors.connect(&profile).await?;
    let result = connected.connector.test_connection().await;
    info!(host = %profile.cluster_host, status = ?result.status, "connection tested");
    Ok(result)
}

/// Probes every platform service and stores the outcome for readiness scoring.
pub(crate) async fn discover(state: &AppState) -> Result<DiscoveryReport, ServiceError> {
    let (_, connector) = connect_configured(state).await?;
    let report = connector.discover_services().await;
    state.db.record_service_statuses(&report.service_statuses)?;
    info!(host = %connector.cluster_host, message = %report.message, "services discovered");
    Ok(report)
}

/// Readiness of the configured cluster, from a fresh discovery.
pub(crate) async fn readiness(state: &AppState) -> Result<ReadinessScore, ServiceError> {
    let report = discover(state).await?;
    Ok(ReadinessScore::compute(report.service_statuses))
}
