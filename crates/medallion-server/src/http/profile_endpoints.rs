// SPDX-License-Identifier: Apache-2.0

use super::{within_timeout, ApiFailure, ApiResult, QueryMap};
use crate::services::bootstrap::bootstrap;
use crate::services::discovery::{self, CLUSTER_HOST_REQUIRED};
use crate::services::scenario::run_scenario;
use crate::services::{connect_configured, ServiceError};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use medallion_api::{parse_limit, ApiError, LimitBounds};
use medallion_model::{
    BootstrapResult, ConnectionProfile, ConnectionTestResult, DemoEvent, DiscoveryReport,
    PolarisCredentials, ProfileUpdate, ReadinessScore, ScenarioKind, ScenarioRequest,
    ScenarioResult,
};
use serde_json::{json, Value};
use tracing::{info, warn};

fn validate_update(update: &ProfileUpdate) -> Result<(), ApiError> {
    let mut field_errors = serde_json::Map::new();
    if update.cluster_host_trimmed().is_none() {
        field_errors.insert("cluster_host".into(), json!(CLUSTER_HOST_REQUIRED));
    }
    if let Some(raw) = update
        .polaris_credentials
        .as_deref()
        .filter(|r| !r.trim().is_empty())
    {
        if let Err(err) = PolarisCredentials::parse(raw) {
            field_errors.insert("polaris_credentials".into(), json!(err.0));
        }
    }
    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_failed(
            "profile validation failed",
            Value::Object(field_errors),
        ))
    }
}

pub(crate) async fn get_profile_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<ConnectionProfile>> {
    Ok(Json(state.db.profile_or_default()?))
}

/// Saves the profile, then tries to issue S3 keys for it. Key generation
/// failures are logged and do not fail the save.
pub(crate) async fn put_profile_handler(
    State(state): State<AppState>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<ConnectionProfile>> {
    let Json(update) = body?;
    validate_update(&update)?;
    let profile = state.db.upsert_profile(update)?;
    let generated = tokio::time::timeout(
        state.api.request_timeout,
        state.connectors.generate_s3_keys(&profile),
    )
    .await;
    match generated {
        Ok(Ok(keys)) => {
            state.db.store_s3_credentials(&keys)?;
            info!(host = %profile.cluster_host, "s3 keys issued for saved profile");
        }
        Ok(Err(err)) => warn!(error = %err, "s3 key generation failed after profile save"),
        Err(_) => warn!("s3 key generation timed out after profile save"),
    }
    Ok(Json(state.db.profile_or_default()?))
}

pub(crate) async fn delete_profile_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    state.db.delete_profile()?;
    Ok(Json(json!({"status": "deleted"})))
}

/// The body is optional: an empty body tests the stored profile.
pub(crate) async fn test_profile_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ConnectionTestResult>> {
    let candidate = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let update: ProfileUpdate = serde_json::from_slice(&body).map_err(|err| {
            ApiFailure(
                StatusCode::BAD_REQUEST,
                ApiError::invalid_request(format!("invalid JSON body: {err}")),
            )
        })?;
        Some(update)
    };
    let result = within_timeout(&state, discovery::test_connection(&state, candidate)).await?;
    Ok(Json(result))
}

pub(crate) async fn services_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<DiscoveryReport>> {
    Ok(Json(within_timeout(&state, discovery::discover(&state)).await?))
}

pub(crate) async fn readiness_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<ReadinessScore>> {
    Ok(Json(within_timeout(&state, discovery::readiness(&state)).await?))
}

/// Issues fresh S3 keys and stores them. The secret key is not returned.
pub(crate) async fn s3_credentials_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let keys = within_timeout(&state, async {
        let profile = state.db.profile_or_default()?;
        if !profile.is_configured() {
            return Err(ServiceError::NotConfigured);
        }
        Ok(state.connectors.generate_s3_keys(&profile).await?)
    })
    .await?;
    state.db.store_s3_credentials(&keys)?;
    Ok(Json(json!({
        "status": "success",
        "accessKey": keys.access_key,
        "expiryTime": keys.expiry_time,
    })))
}

pub(crate) async fn events_handler(
    State(state): State<AppState>,
    axum::extract::Query(query): QueryMap,
) -> ApiResult<Json<Vec<DemoEvent>>> {
    let limit = parse_limit(&query, LimitBounds::EVENTS)?;
    Ok(Json(state.db.recent_events(limit)?))
}

pub(crate) async fn bootstrap_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<BootstrapResult>> {
    let result = within_timeout(&state, async {
        let (profile, connector) = connect_configured(&state).await?;
        bootstrap(&state.db, &connector, &profile.id).await
    })
    .await?;
    Ok(Json(result))
}

pub(crate) async fn bootstrap_status_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let current = state.db.bootstrap_state()?;
    if !current.bootstrapped {
        return Ok(Json(json!({"bootstrapped": false})));
    }
    Ok(Json(json!(current)))
}

pub(crate) async fn scenario_handler(
    State(state): State<AppState>,
    body: Result<Json<ScenarioRequest>, JsonRejection>,
) -> ApiResult<Json<ScenarioResult>> {
    let Json(request) = body?;
    let kind = ScenarioKind::parse(&request.scenario_type)
        .map_err(|err| ApiFailure(StatusCode::BAD_REQUEST, ApiError::invalid_request(err.0)))?;
    let result = within_timeout(&state, async {
        let (profile, connector) = connect_configured(&state).await?;
        run_scenario(&state.db, &connector, &state.api, &profile.id, kind).await
    })
    .await?;
    Ok(Json(result))
}
