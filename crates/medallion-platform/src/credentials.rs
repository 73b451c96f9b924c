// SPDX-License-Identifier: Apache-2.0

use crate::error::PlatformError;
use crate::http::{expect_success, parse_json, send_with_retry};
use crate::settings::PlatformSettings;
use medallion_model::{ConnectionProfile, S3Credentials};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

const TEMP_KEY_DURATION_SECS: u32 = 900;
const DEFAULT_REST_USER: &str = "mapr";

#[derive(Debug, Deserialize)]
struct TempKeyResponse {
    status: String,
    #[serde(default)]
    data: Vec<TempKeyEntry>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TempKeyEntry {
    accesskey: String,
    secretkey: String,
    #[serde(rename = "expiryTime")]
    expiry_time: i64,
}

/// Asks the platform REST API for short-lived object store keys for the profile user.
pub async fn generate_temp_keys(
    client: &Client,
    settings: &PlatformSettings,
    profile: &ConnectionProfile,
) -> Result<S3Credentials, PlatformError> {
    let host = profile.cluster_host.trim();
    let user = profile
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_REST_USER);
    let url = format!(
        "{}/rest/s3keys/gentempkey",
        settings.base_url(host, settings.rest_port)
    );
    let query = [
        ("cluster", host.to_string()),
        ("domainname", "primary".to_string()),
        ("accountname", "default".to_string()),
        ("username", user.to_string()),
        ("duration", TEMP_KEY_DURATION_SECS.to_string()),
    ];
    let resp = send_with_retry(&settings.retry, "s3 temp key", || {
        client
            .get(&url)
            .query(&query)
            .basic_auth(profile.username_or_empty(), Some(profile.password_or_empty()))
    })
    .await?;
    let body = expect_success(resp, "s3 temp key").await?;
    let parsed: TempKeyResponse = parse_json(&body, "s3 temp key")?;
    if !parsed.status.eq_ignore_ascii_case("OK") {
        return Err(PlatformError::upstream(format!(
            "s3 temp key generation returned status {}: {:?}",
            parsed.status, parsed.errors
        )));
    }
    let entry = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| PlatformError::upstream("s3 temp key response carried no keys"))?;
    info!(host, expiry_time = entry.expiry_time, "generated temporary s3 keys");
    Ok(S3Credentials {
        access_key: entry.accesskey,
        secret_key: entry.secretkey,
        expiry_time: entry.expiry_time,
    })
}

/// Outcome of resolving the keys the object store client signs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKeys {
    pub access_key: String,
    pub secret_key: String,
    /// Present when new keys were generated and should be persisted.
    pub refreshed: Option<S3Credentials>,
}

/// Reuses stored keys while fresh; otherwise regenerates them, falling back to
/// the profile's username and password when generation fails.
pub async fn resolve_s3_keys(
    client: &Client,
    settings: &PlatformSettings,
    profile: &ConnectionProfile,
    now_ms: i64,
) -> ResolvedKeys {
    if let Some(stored) = profile.stored_s3_credentials() {
        if stored.is_fresh(now_ms) {
            return ResolvedKeys {
                access_key: stored.access_key,
                secret_key: stored.secret_key,
                refreshed: None,
            };
        }
    }
    match generate_temp_keys(client, settings, profile).await {
        Ok(creds) => ResolvedKeys {
            access_key: creds.access_key.clone(),
            secret_key: creds.secret_key.clone(),
            refreshed: Some(creds),
        },
        Err(err) => {
            warn!(error = %err, "s3 key generation failed, falling back to profile credentials");
            ResolvedKeys {
                access_key: profile.username_or_empty().to_string(),
                secret_key: profile.password_or_empty().to_string(),
                refreshed: None,
            }
        }
    }
}
