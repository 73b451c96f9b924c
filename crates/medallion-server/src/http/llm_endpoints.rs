// SPDX-License-Identifier: Apache-2.0

use super::{ApiFailure, ApiResult};
use crate::services::llm::{forward_chat, ChatRequest};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

/// Relays the upstream status and body unchanged, error statuses included.
pub(crate) async fn llm_chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = body?;
    let (status, payload) = forward_chat(&state.llm_client, state.api.llm_timeout, request)
        .await
        .map_err(ApiFailure::from)?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(payload)))
}
