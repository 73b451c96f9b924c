// SPDX-License-Identifier: Apache-2.0

pub(crate) mod debug_endpoints;
pub(crate) mod llm_endpoints;
pub(crate) mod profile_endpoints;
pub(crate) mod request_tracing;
pub(crate) mod resource_endpoints;

use crate::services::ServiceError;
use crate::store::state_db::StateError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use medallion_api::{openapi_v1_spec, ApiError, ApiErrorCode};
use medallion_platform::{PlatformError, PlatformErrorCode};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;

/// Error response: status plus the structured error body.
#[derive(Debug)]
pub(crate) struct ApiFailure(pub StatusCode, pub ApiError);

pub(crate) type ApiResult<T> = Result<T, ApiFailure>;

pub(crate) type QueryMap = axum::extract::Query<BTreeMap<String, String>>;

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1.to_body())).into_response()
    }
}

fn platform_failure(err: PlatformError) -> ApiFailure {
    match err.code {
        PlatformErrorCode::NotFound => ApiFailure(
            StatusCode::NOT_FOUND,
            ApiError::new(ApiErrorCode::NotFound, err.message, json!({})),
        ),
        PlatformErrorCode::Validation => ApiFailure(
            StatusCode::BAD_REQUEST,
            ApiError::invalid_request(err.message),
        ),
        PlatformErrorCode::Network => ApiFailure(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::upstream_unavailable(err.message),
        ),
        code => ApiFailure(
            StatusCode::BAD_GATEWAY,
            ApiError::upstream(err.message, json!({"platform_code": code.as_str()})),
        ),
    }
}

impl From<ServiceError> for ApiFailure {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotConfigured => {
                ApiFailure(StatusCode::BAD_REQUEST, ApiError::not_configured())
            }
            ServiceError::Invalid(message) => {
                ApiFailure(StatusCode::BAD_REQUEST, ApiError::invalid_request(message))
            }
            ServiceError::Platform(err) => platform_failure(err),
            ServiceError::State(err) => ApiFailure(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal(err.0),
            ),
        }
    }
}

impl From<StateError> for ApiFailure {
    fn from(err: StateError) -> Self {
        ServiceError::State(err).into()
    }
}

impl From<ApiError> for ApiFailure {
    fn from(err: ApiError) -> Self {
        let status = match err.code {
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ApiErrorCode::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiFailure(status, err)
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiFailure(
            status,
            ApiError::invalid_request(format!("invalid JSON body: {}", rejection.body_text())),
        )
    }
}

/// Runs platform-bound work under the configured request timeout.
pub(crate) async fn within_timeout<T>(
    state: &AppState,
    work: impl Future<Output = Result<T, ServiceError>>,
) -> ApiResult<T> {
    match tokio::time::timeout(state.api.request_timeout, work).await {
        Ok(result) => result.map_err(ApiFailure::from),
        Err(_) => Err(ApiFailure(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::upstream_unavailable(format!(
                "platform request timed out after {} ms",
                state.api.request_timeout.as_millis()
            )),
        )),
    }
}

pub(crate) async fn health_handler() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

pub(crate) async fn openapi_handler() -> Json<Value> {
    Json(openapi_v1_spec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_codes_map_to_gateway_statuses() {
        let cases = [
            (PlatformErrorCode::Network, StatusCode::SERVICE_UNAVAILABLE),
            (PlatformErrorCode::Upstream, StatusCode::BAD_GATEWAY),
            (PlatformErrorCode::Unauthorized, StatusCode::BAD_GATEWAY),
            (PlatformErrorCode::NotFound, StatusCode::NOT_FOUND),
            (PlatformErrorCode::Validation, StatusCode::BAD_REQUEST),
        ];
        for (code, status) in cases {
            let failure = ApiFailure::from(ServiceError::Platform(PlatformError::new(code, "x")));
            assert_eq!(failure.0, status, "{code:?}");
        }
    }

    #[test]
    fn upstream_errors_carry_the_platform_code() {
        let failure = ApiFailure::from(ServiceError::Platform(PlatformError::new(
            PlatformErrorCode::Unauthorized,
            "denied",
        )));
        assert_eq!(failure.1.code, ApiErrorCode::UpstreamError);
        assert_eq!(failure.1.details["platform_code"], "unauthorized");
    }

    #[test]
    fn missing_profile_is_a_bad_request() {
        let failure = ApiFailure::from(ServiceError::NotConfigured);
        assert_eq!(failure.0, StatusCode::BAD_REQUEST);
        assert_eq!(failure.1.to_body()["detail"], "Profile not configured");
    }
}
