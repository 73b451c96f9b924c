// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ApiErrorCode {
    InvalidRequest,
    InvalidQueryParameter,
    ValidationFailed,
    NotConfigured,
    NotFound,
    UpstreamError,
    UpstreamUnavailable,
    InternalError,
}

pub const API_ERROR_CODES: [&str; 8] = [
    "invalid_request",
    "invalid_query_parameter",
    "validation_failed",
    "not_configured",
    "not_found",
    "upstream_error",
    "upstream_unavailable",
    "internal_error",
];

impl ApiErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidQueryParameter => "invalid_query_parameter",
            Self::ValidationFailed => "validation_failed",
            Self::NotConfigured => "not_configured",
            Self::NotFound => "not_found",
            Self::UpstreamError => "upstream_error",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message, json!({}))
    }

    #[must_use]
    pub fn invalid_param(name: &str, value: &str) -> Self {
        Self::new(
            ApiErrorCode::InvalidQueryParameter,
            format!("invalid query parameter: {name}"),
            json!({"parameter": name, "value": value}),
        )
    }

    #[must_use]
    pub fn validation_failed(message: impl Into<String>, field_errors: Value) -> Self {
        Self::new(
            ApiErrorCode::ValidationFailed,
            message,
            json!({"field_errors": field_errors}),
        )
    }

    #[must_use]
    pub fn not_configured() -> Self {
        Self::new(
            ApiErrorCode::NotConfigured,
            "Profile not configured",
            json!({}),
        )
    }

    #[must_use]
    pub fn not_found(what: &str, name: &str) -> Self {
        Self::new(
            ApiErrorCode::NotFound,
            format!("{what} not found: {name}"),
            json!({"resource": what, "name": name}),
        )
    }

    #[must_use]
    pub fn upstream(message: impl Into<String>, details: Value) -> Self {
        Self::new(ApiErrorCode::UpstreamError, message, details)
    }

    #[must_use]
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::UpstreamUnavailable, message, json!({}))
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message, json!({}))
    }

    /// Response body: the structured error plus a top-level `detail` string for the dashboard banners.
    #[must_use]
    pub fn to_body(&self) -> Value {
        json!({
            "detail": self.message,
            "error": self,
        })
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

const _: fn() = || {
    fn assert_traits<T: Serialize + for<'de> Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
    assert_traits::<ApiError>();
};
