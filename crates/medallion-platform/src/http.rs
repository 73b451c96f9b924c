// SPDX-License-Identifier: Apache-2.0

use crate::error::PlatformError;
use crate::retry::{BackoffPolicy, RetryPolicy};
use crate::settings::PlatformSettings;
use reqwest::{Client, RequestBuilder, Response};
use tracing::warn;

/// Client for platform endpoints, which usually present self-signed certificates.
pub fn build_client(settings: &PlatformSettings) -> Result<Client, PlatformError> {
    Client::builder()
        .danger_accept_invalid_certs(settings.accept_invalid_certs)
        .timeout(settings.request_timeout)
        .connect_timeout(settings.probe_timeout)
        .build()
        .map_err(PlatformError::network)
}

/// Sends a request, rebuilding it for each attempt, and retries transport
/// failures and transient statuses per `retry`.
pub async fn send_with_retry<F>(
    retry: &RetryPolicy,
    context: &str,
    build: F,
) -> Result<Response, PlatformError>
where
    F: Fn() -> RequestBuilder,
{
    try_send_with_retry(retry, context, || Ok(build())).await
}

/// Like [`send_with_retry`], for requests whose construction can fail (for
/// example signing). A build failure is returned at once and never retried.
pub async fn try_send_with_retry<F>(
    retry: &RetryPolicy,
    context: &str,
    build: F,
) -> Result<Response, PlatformError>
where
    F: Fn() -> Result<RequestBuilder, PlatformError>,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match build()?.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if RetryPolicy::is_retryable_status(status) && attempt < retry.max_attempts {
                    warn!(context, status, attempt, "transient platform status, retrying");
                } else {
                    return Ok(resp);
                }
            }
            Err(err) => {
                if attempt >= retry.max_attempts {
                    return Err(PlatformError::network(format!("{context}: {err}")));
                }
                warn!(context, attempt, error = %err, "platform request failed, retrying");
            }
        }
        tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
    }
}

/// Returns the body of a successful response, or a status-mapped error.
pub async fn expect_success(resp: Response, context: &str) -> Result<String, PlatformError> {
    let status = resp.status().as_u16();
    let body = resp.text().await.map_err(PlatformError::network)?;
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(PlatformError::from_status(status, context, &body))
    }
}

pub fn parse_json<T: serde::de::DeserializeOwned>(
    body: &str,
    context: &str,
) -> Result<T, PlatformError> {
    serde_json::from_str(body)
        .map_err(|e| PlatformError::upstream(format!("{context}: invalid JSON response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn build_failure_is_returned_without_sending() {
        let attempts = AtomicUsize::new(0);
        let err = try_send_with_retry(&RetryPolicy::default(), "signed request", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(PlatformError::new(PlatformErrorCode::Internal, "cannot sign"))
        })
        .await
        .expect_err("build fails");
        assert_eq!(err.code, PlatformErrorCode::Internal);
        assert_eq!(err.message, "cannot sign");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
