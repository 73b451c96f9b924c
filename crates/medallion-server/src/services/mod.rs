// SPDX-License-Identifier: Apache-2.0

pub(crate) mod bootstrap;
pub(crate) mod dashboard;
pub(crate) mod discovery;
pub(crate) mod llm;
pub(crate) mod scenario;

use crate::store::state_db::StateError;
use crate::AppState;
use medallion_model::{ConnectionProfile, ValidationError};
use medallion_platform::{PlatformConnector, PlatformError};
use tracing::warn;

/// Failure of an orchestration step, mapped to an HTTP status by the handlers.
#[derive(Debug)]
pub(crate) enum ServiceError {
    NotConfigured,
    Invalid(String),
    Platform(PlatformError),
    State(StateError),
}

impl From<PlatformError> for ServiceError {
    fn from(err: PlatformError) -> Self {
        Self::Platform(err)
    }
}

impl From<StateError> for ServiceError {
    fn from(err: StateError) -> Self {
        Self::State(err)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(err.0)
    }
}

/// Clients for the stored profile. Temporary S3 keys generated while
/// connecting are written back to the profile.
pub(crate) async fn connect_configured(
    state: &AppState,
) -> Result<(ConnectionProfile, PlatformConnector), ServiceError> {
    let profile = state.db.profile_or_default()?;
    if !profile.is_configured() {
        return Err(ServiceError::NotConfigured);
    }
    let connected = state.connectors.connect(&profile).await?;
    if let Some(keys) = &connected.refreshed_keys {
        if let Err(err) = state.db.store_s3_credentials(keys) {
            warn!(error = %err, "failed to persist refreshed s3 credentials");
        }
    }
    Ok((profile, connected.connector))
}
