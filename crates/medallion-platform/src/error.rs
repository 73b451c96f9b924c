// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformErrorCode {
    NotFound,
    Validation,
    Conflict,
    Unauthorized,
    Network,
    Upstream,
    Storage,
    Unsupported,
    Internal,
}

impl PlatformErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation_error",
            Self::Conflict => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Network => "network_error",
            Self::Upstream => "upstream_error",
            Self::Storage => "storage_error",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub code: PlatformErrorCode,
    pub message: String,
}

impl PlatformError {
    #[must_use]
    pub fn new(code: PlatformErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn network(err: impl Display) -> Self {
        Self::new(PlatformErrorCode::Network, err.to_string())
    }

    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorCode::Upstream, message)
    }

    #[must_use]
    pub fn storage(err: impl Display) -> Self {
        Self::new(PlatformErrorCode::Storage, err.to_string())
    }

    /// Maps a non-success HTTP status from a platform endpoint.
    #[must_use]
    pub fn from_status(status: u16, context: &str, body: &str) -> Self {
        let code = match status {
            401 | 403 => PlatformErrorCode::Unauthorized,
            404 => PlatformErrorCode::NotFound,
            409 => PlatformErrorCode::Conflict,
            400 | 422 => PlatformErrorCode::Validation,
            _ => PlatformErrorCode::Upstream,
        };
        let snippet: String = body.chars().take(240).collect();
        Self::new(code, format!("{context}: HTTP {status} {}", snippet.trim()))
    }
}

impl Display for PlatformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PlatformError {}

impl From<rusqlite::Error> for PlatformError {
    fn from(err: rusqlite::Error) -> Self {
        Self::storage(err)
    }
}

impl From<medallion_model::ValidationError> for PlatformError {
    fn from(err: medallion_model::ValidationError) -> Self {
        Self::new(PlatformErrorCode::Validation, err.0)
    }
}
