// SPDX-License-Identifier: Apache-2.0

use super::{ApiFailure, ApiResult, QueryMap};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use medallion_api::{parse_limit, ApiError, LimitBounds};
use serde_json::{json, Value};

pub(crate) async fn debug_tables_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(json!({"tables": state.db.debug_tables()?})))
}

pub(crate) async fn debug_table_rows_handler(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): QueryMap,
) -> ApiResult<Json<Value>> {
    let limit = parse_limit(&query, LimitBounds::DEBUG_ROWS)?;
    let rows = state.db.debug_table_rows(&table, limit)?.ok_or_else(|| {
        ApiFailure(StatusCode::NOT_FOUND, ApiError::not_found("table", &table))
    })?;
    Ok(Json(json!({"table": table, "rows": rows})))
}
