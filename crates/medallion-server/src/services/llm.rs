// SPDX-License-Identifier: Apache-2.0

use super::ServiceError;
use medallion_platform::PlatformError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

pub(crate) const MISSING_FIELDS: &str = "Missing base_url or payload";

/// Body of `POST /llm/chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, alias = "api_key")]
    pub api_token: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim().trim_end_matches('/'))
}

/// Relays `payload` to an OpenAI-compatible endpoint. The upstream status and
/// JSON body are returned as-is, including error statuses.
pub(crate) async fn forward_chat(
    client: &Client,
    timeout: Duration,
    request: ChatRequest,
) -> Result<(u16, Value), ServiceError> {
    let base_url = request
        .base_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ServiceError::Invalid(MISSING_FIELDS.to_string()))?;
    let payload = request
        .payload
        .filter(|p| !p.is_null())
        .ok_or_else(|| ServiceError::Invalid(MISSING_FIELDS.to_string()))?;

    let url = completions_url(&base_url);
    let mut builder = client.post(&url).timeout(timeout).json(&payload);
    if let Some(key) = request.api_token.as_deref().filter(|k| !k.trim().is_empty()) {
        builder = builder.bearer_auth(key.trim());
    }
    let resp = builder.send().await.map_err(|err| {
        warn!(url = %url, error = %err, "llm request failed");
        PlatformError::upstream(format!("LLM request failed: {err}"))
    })?;
    let status = resp.status().as_u16();
    let text = resp
        .text()
        .await
        .map_err(|err| PlatformError::upstream(format!("LLM response unreadable: {err}")))?;
    let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| json!({"detail": text}));
    info!(url = %url, status, "llm request relayed");
    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_trims_trailing_slashes() {
        assert_eq!(
            completions_url("http://llm.local/v1/"),
            "http://llm.local/v1/chat/completions"
        );
        assert_eq!(
            completions_url(" http://llm.local/v1 "),
            "http://llm.local/v1/chat/completions"
        );
    }

    #[test]
    fn token_field_is_read_from_the_dashboard_body() {
        let request: ChatRequest = serde_json::from_value(json!({
            "base_url": "http://llm.local/v1",
            "api_token": "sk-live",
            "payload": {"model": "m"},
        }))
        .expect("request");
        assert_eq!(request.api_token.as_deref(), Some("sk-live"));

        let legacy: ChatRequest =
            serde_json::from_value(json!({"api_key": "sk-old"})).expect("request");
        assert_eq!(legacy.api_token.as_deref(), Some("sk-old"));
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_any_request() {
        let client = Client::new();
        let err = forward_chat(
            &client,
            Duration::from_secs(1),
            ChatRequest {
                base_url: Some("http://127.0.0.1:1".into()),
                ..ChatRequest::default()
            },
        )
        .await
        .expect_err("no payload");
        assert!(matches!(err, ServiceError::Invalid(msg) if msg == MISSING_FIELDS));
    }

    #[tokio::test]
    async fn transport_failure_is_an_upstream_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let err = forward_chat(
            &Client::new(),
            Duration::from_secs(2),
            ChatRequest {
                base_url: Some(format!("http://{addr}")),
                payload: Some(json!({"messages": []})),
                ..ChatRequest::default()
            },
        )
        .await
        .expect_err("refused");
        assert!(
            matches!(err, ServiceError::Platform(e) if e.message.starts_with("LLM request failed"))
        );
    }
}
