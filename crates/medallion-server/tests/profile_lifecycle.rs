// SPDX-License-Identifier: Apache-2.0

#[path = "server_support/mod.rs"]
mod server_support;

use serde_json::Value;
use server_support::{configure, get_json, send_empty, send_json, spawn_app, PROFILE_BODY};

#[tokio::test]
async fn health_and_openapi_are_served() {
    let app = spawn_app().await;
    let (status, body) = get_json(app.addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");

    let (status, spec) = get_json(app.addr, "/openapi.json").await;
    assert_eq!(status, 200);
    assert!(spec["paths"]["/profile"].is_object());
}

#[tokio::test]
async fn unsaved_profile_is_the_default() {
    let app = spawn_app().await;
    let (status, body) = get_json(app.addr, "/profile").await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], "default");
    assert_eq!(body["configured"], false);
    assert_eq!(body["cluster_host"], "");
}

#[tokio::test]
async fn saving_a_profile_marks_it_configured_and_issues_keys() {
    let app = spawn_app().await;
    let (status, saved) = send_json(app.addr, "PUT", "/profile", PROFILE_BODY).await;
    assert_eq!(status, 200);
    assert_eq!(saved["configured"], true);
    assert_eq!(saved["cluster_host"], "df.local");
    let keys: Value =
        serde_json::from_str(saved["s3_credentials"].as_str().expect("keys stored")).expect("keys");
    assert_eq!(keys["accessKey"], "FAKE-mapr");

    // Password is kept when a later update omits it.
    let (status, updated) = send_json(
        app.addr,
        "PUT",
        "/profile",
        r#"{"cluster_host":"df.local","username":"mapr"}"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(updated["password"], "secret");
}

#[tokio::test]
async fn profile_validation_reports_field_errors() {
    let app = spawn_app().await;
    let (status, body) = send_json(
        app.addr,
        "PUT",
        "/profile",
        r#"{"cluster_host":"  ","polaris_credentials":"garbage"}"#,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "validation_failed");
    let fields = &body["error"]["details"]["field_errors"];
    assert!(fields["cluster_host"].is_string());
    assert!(fields["polaris_credentials"].is_string());

    let (status, body) = send_json(app.addr, "PUT", "/profile", "{not json").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn connection_test_needs_a_configuration_or_a_host() {
    let app = spawn_app().await;
    let (status, body) = send_empty(app.addr, "POST", "/profile/test").await;
    assert_eq!(status, 400);
    assert_eq!(
        body["detail"],
        "No configuration found. Please save settings or provide them in the request."
    );

    let (status, body) = send_json(app.addr, "POST", "/profile/test", r#"{"username":"x"}"#).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["detail"],
        "Cluster Host is required. Please verify your configuration."
    );

    let (status, body) = send_json(
        app.addr,
        "POST",
        "/profile/test",
        r#"{"cluster_host":"other.local","username":"u","password":"p"}"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");

    // Testing with a body does not save it.
    let (_, profile) = get_json(app.addr, "/profile").await;
    assert_eq!(profile["configured"], false);
}

#[tokio::test]
async fn discovery_persists_statuses_for_readiness() {
    let app = spawn_app().await;
    let (status, body) = get_json(app.addr, "/profile/services").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "not_configured");

    configure(app.addr).await;
    let (status, report) = get_json(app.addr, "/profile/services").await;
    assert_eq!(status, 200);
    let statuses = report["service_statuses"].as_array().expect("statuses");
    assert!(!statuses.is_empty());

    let (status, readiness) = get_json(app.addr, "/profile/readiness").await;
    assert_eq!(status, 200);
    assert!(readiness["score"].is_number());

    let (status, tables) = get_json(app.addr, "/debug/tables").await;
    assert_eq!(status, 200);
    let service_rows = tables["tables"]
        .as_array()
        .expect("tables")
        .iter()
        .find(|t| t["name"] == "service_status")
        .and_then(|t| t["row_count"].as_i64())
        .expect("service_status count");
    assert_eq!(service_rows as usize, statuses.len());
}

#[tokio::test]
async fn s3_credentials_are_regenerated_without_the_secret() {
    let app = spawn_app().await;
    let (status, _) = get_json(app.addr, "/profile/s3credentials").await;
    assert_eq!(status, 400);

    configure(app.addr).await;
    let (status, body) = get_json(app.addr, "/profile/s3credentials").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["accessKey"], "FAKE-mapr");
    assert!(body["expiryTime"].as_i64().is_some());
    assert!(body.get("secretKey").is_none());
}

#[tokio::test]
async fn deleting_the_profile_resets_state() {
    let app = spawn_app().await;
    configure(app.addr).await;
    let (status, body) = send_empty(app.addr, "DELETE", "/profile").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "deleted");

    let (_, profile) = get_json(app.addr, "/profile").await;
    assert_eq!(profile["configured"], false);
    let (_, bootstrap) = get_json(app.addr, "/profile/bootstrap/status").await;
    assert_eq!(bootstrap, serde_json::json!({"bootstrapped": false}));
}
