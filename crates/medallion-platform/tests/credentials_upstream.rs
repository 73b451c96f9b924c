// SPDX-License-Identifier: Apache-2.0

mod support;

use medallion_model::{ConnectionProfile, S3Credentials};
use medallion_platform::{
    build_client, generate_temp_keys, resolve_s3_keys, PlatformErrorCode, PlatformSettings,
    RetryPolicy,
};
use serde_json::json;
use support::{MockUpstream, Reply};

fn settings_for(upstream: &MockUpstream) -> PlatformSettings {
    PlatformSettings {
        scheme: "http".to_string(),
        rest_port: upstream.addr.port(),
        retry: RetryPolicy::single_attempt(),
        ..PlatformSettings::default()
    }
}

fn profile() -> ConnectionProfile {
    ConnectionProfile {
        cluster_host: "127.0.0.1".to_string(),
        username: Some("analyst".to_string()),
        password: Some("pw".to_string()),
        configured: true,
        ..ConnectionProfile::default()
    }
}

#[tokio::test]
async fn temp_keys_are_requested_with_basic_auth() {
    let upstream = MockUpstream::start(|_| {
        Reply::json(
            200,
            json!({"status": "OK", "data": [{
                "accesskey": "AK", "secretkey": "SK", "expiryTime": 1_900_000_000_000_i64
            }]}),
        )
    })
    .await;
    let settings = settings_for(&upstream);
    let client = build_client(&settings).expect("client");

    let creds = generate_temp_keys(&client, &settings, &profile())
        .await
        .expect("keys");
    assert_eq!(
        creds,
        S3Credentials {
            access_key: "AK".into(),
            secret_key: "SK".into(),
            expiry_time: 1_900_000_000_000,
        }
    );

    let seen = upstream.recorded();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path(), "/rest/s3keys/gentempkey");
    let query = seen[0].query();
    for part in [
        "cluster=127.0.0.1",
        "domainname=primary",
        "accountname=default",
        "username=analyst",
        "duration=900",
    ] {
        assert!(query.contains(part), "missing {part} in {query}");
    }
    assert!(seen[0]
        .header("authorization")
        .is_some_and(|v| v.starts_with("Basic ")));
}

#[tokio::test]
async fn non_ok_status_is_an_upstream_error() {
    let upstream = MockUpstream::start(|_| {
        Reply::json(200, json!({"status": "ERROR", "errors": [{"desc": "no such user"}]}))
    })
    .await;
    let settings = settings_for(&upstream);
    let client = build_client(&settings).expect("client");
    let err = generate_temp_keys(&client, &settings, &profile())
        .await
        .expect_err("error status");
    assert_eq!(err.code, PlatformErrorCode::Upstream);
}

#[tokio::test]
async fn resolution_falls_back_to_profile_credentials() {
    let upstream = MockUpstream::start(|_| Reply::empty(500)).await;
    let settings = settings_for(&upstream);
    let client = build_client(&settings).expect("client");
    let keys = resolve_s3_keys(&client, &settings, &profile(), 0).await;
    assert_eq!(keys.access_key, "analyst");
    assert_eq!(keys.secret_key, "pw");
    assert!(keys.refreshed.is_none());
}

#[tokio::test]
async fn fresh_stored_keys_skip_the_network() {
    let upstream = MockUpstream::start(|_| Reply::empty(500)).await;
    let settings = settings_for(&upstream);
    let client = build_client(&settings).expect("client");
    let stored = S3Credentials {
        access_key: "AK".into(),
        secret_key: "SK".into(),
        expiry_time: 10_000_000,
    };
    let profile = ConnectionProfile {
        s3_credentials: Some(stored.to_json()),
        ..profile()
    };
    let keys = resolve_s3_keys(&client, &settings, &profile, 1_000).await;
    assert_eq!(keys.access_key, "AK");
    assert!(upstream.recorded().is_empty());
}
