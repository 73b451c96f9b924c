// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE_ID: &str = "default";
pub const DEFAULT_PROFILE_NAME: &str = "Data Fabric Connection";
/// Temporary S3 keys are regenerated once they expire within this window.
pub const S3_CREDENTIAL_REFRESH_MARGIN_MS: i64 = 120_000;

const DEFAULT_POLARIS_REALM: &str = "POLARIS";
const POLARIS_CREDENTIALS_MARKER: &str = "root principal credentials:";

/// The single connection profile the demo operates against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub id: String,
    pub name: String,
    pub cluster_host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub s3_credentials: Option<String>,
    #[serde(default)]
    pub polaris_credentials: Option<String>,
    #[serde(default)]
    pub configured: bool,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: DEFAULT_PROFILE_NAME.to_string(),
            cluster_host: String::new(),
            username: None,
            password: None,
            created_at: None,
            updated_at: None,
            s3_credentials: None,
            polaris_credentials: None,
            configured: false,
        }
    }
}

impl ConnectionProfile {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured && !self.cluster_host.trim().is_empty()
    }

    #[must_use]
    pub fn username_or_empty(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn password_or_empty(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    /// Stored S3 keys, ignoring a malformed column.
    #[must_use]
    pub fn stored_s3_credentials(&self) -> Option<S3Credentials> {
        self.s3_credentials
            .as_deref()
            .and_then(|raw| S3Credentials::from_json(raw).ok())
    }
}

/// Request body of `PUT /profile`, and the optional body of `POST /profile/test`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cluster_host: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub polaris_credentials: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn cluster_host_trimmed(&self) -> Option<&str> {
        self.cluster_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }

    /// Profile used for a one-off connection test; never persisted.
    #[must_use]
    pub fn into_transient_profile(self) -> ConnectionProfile {
        ConnectionProfile {
            name: self
                .name
                .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string()),
            cluster_host: self.cluster_host.unwrap_or_default().trim().to_string(),
            username: self.username,
            password: self.password,
            polaris_credentials: self.polaris_credentials,
            configured: true,
            ..ConnectionProfile::default()
        }
    }
}

/// Temporary object store keys as issued by the platform REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Credentials {
    #[serde(rename = "accessKey")]
    pub access_key: String,
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    /// Epoch milliseconds.
    #[serde(rename = "expiryTime")]
    pub expiry_time: i64,
}

impl S3Credentials {
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(raw)
            .map_err(|e| ValidationError(format!("invalid stored s3 credentials: {e}")))
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "accessKey": self.access_key,
            "secretKey": self.secret_key,
            "expiryTime": self.expiry_time,
        })
        .to_string()
    }

    #[must_use]
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.expiry_time.saturating_sub(now_ms) > S3_CREDENTIAL_REFRESH_MARGIN_MS
    }
}

/// Catalog principal credentials, pasted as printed by the catalog bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolarisCredentials {
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

impl PolarisCredentials {
    /// Accepts `"... <realm> root principal credentials: <id>:<secret>"` or a bare
    /// `"<id>:<secret>"`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        let (realm, pair) = match s.find(POLARIS_CREDENTIALS_MARKER) {
            Some(idx) => {
                let realm = s[..idx]
                    .split_whitespace()
                    .last()
                    .unwrap_or(DEFAULT_POLARIS_REALM)
                    .trim_end_matches(':');
                (realm, s[idx + POLARIS_CREDENTIALS_MARKER.len()..].trim())
            }
            None => (DEFAULT_POLARIS_REALM, s),
        };
        let (client_id, client_secret) = pair.split_once(':').ok_or_else(|| {
            ValidationError("polaris credentials must contain <client_id>:<client_secret>".into())
        })?;
        let client_id = client_id.trim();
        let client_secret = client_secret.trim();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(ValidationError(
                "polaris client id and secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            realm: if realm.is_empty() {
                DEFAULT_POLARIS_REALM.to_string()
            } else {
                realm.to_string()
            },
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}
