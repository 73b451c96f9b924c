// SPDX-License-Identifier: Apache-2.0

use super::{connect_configured, ServiceError};
use crate::AppState;
use medallion_model::DashboardData;
use tracing::warn;

/// Dashboard payload. Platform failures are reported inside the payload so
/// the dashboard can keep polling.
pub(crate) async fn dashboard_data(state: &AppState) -> Result<DashboardData, ServiceError> {
    let profile = state.db.profile_or_default()?;
    if !profile.is_configured() {
        return Ok(DashboardData::unconfigured());
    }
    if !state.db.bootstrap_state()?.bootstrapped {
        return Ok(DashboardData::not_bootstrapped());
    }
    let connector = match connect_configured(state).await {
        Ok((_, connector)) => connector,
        Err(ServiceError::Platform(err)) => {
            warn!(error = %err, "dashboard connection failed");
            return Ok(DashboardData::failed(err.message));
        }
        Err(err) => return Err(err),
    };
    let listed = tokio::try_join!(
        connector.objects.list_buckets(),
        connector.events.list_topics(),
        connector.catalog.list_tables(),
    );
    match listed {
        Ok((buckets, topics, tables)) => Ok(DashboardData::assemble(buckets, topics, tables)),
        Err(err) => {
            warn!(error = %err, "dashboard listing failed");
            Ok(DashboardData::failed(err.message))
        }
    }
}
