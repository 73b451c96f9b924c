// SPDX-License-Identifier: Apache-2.0

use super::{within_timeout, ApiResult, QueryMap};
use crate::services::dashboard::dashboard_data;
use crate::services::{connect_configured, ServiceError};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use medallion_api::{parse_limit, LimitBounds};
use medallion_model::{
    sort_rows_recent_first, BucketDetail, DashboardData, DetailedTopicMetrics, TableData,
    TableIdent, TableMetrics, TopicMessage, TopicMetrics, CONSUMER_GROUP,
};
use medallion_platform::event_stream::ops;
use tracing::debug;

pub(crate) async fn dashboard_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<DashboardData>> {
    Ok(Json(within_timeout(&state, dashboard_data(&state)).await?))
}

pub(crate) async fn bucket_objects_handler(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> ApiResult<Json<BucketDetail>> {
    let detail = within_timeout(&state, async {
        let (_, connector) = connect_configured(&state).await?;
        let objects = connector.objects.list_objects(&bucket, None).await?;
        Ok::<_, ServiceError>(BucketDetail::from_objects(&bucket, objects))
    })
    .await?;
    debug!(bucket = %bucket, objects = detail.objects.len(), "bucket listed");
    Ok(Json(detail))
}

pub(crate) async fn topic_metrics_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> ApiResult<Json<TopicMetrics>> {
    let metrics = within_timeout(&state, async {
        let (_, connector) = connect_configured(&state).await?;
        let events = connector.events.as_ref();
        let metrics = ops::topic_metrics(events, &topic, CONSUMER_GROUP, Utc::now()).await?;
        Ok::<_, ServiceError>(metrics)
    })
    .await?;
    Ok(Json(metrics))
}

/// Most recent records, newest first. Nothing is committed.
pub(crate) async fn topic_messages_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(query): QueryMap,
) -> ApiResult<Json<Vec<TopicMessage>>> {
    let limit = parse_limit(&query, LimitBounds::MESSAGES)?;
    let messages = within_timeout(&state, async {
        let (_, connector) = connect_configured(&state).await?;
        Ok::<_, ServiceError>(ops::list_messages(connector.events.as_ref(), &topic, limit).await?)
    })
    .await?;
    Ok(Json(messages))
}

/// Records the processing group has not consumed yet.
pub(crate) async fn topic_queue_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(query): QueryMap,
) -> ApiResult<Json<Vec<TopicMessage>>> {
    let limit = parse_limit(&query, LimitBounds::MESSAGES)?;
    let messages = within_timeout(&state, async {
        let (_, connector) = connect_configured(&state).await?;
        let events = connector.events.as_ref();
        let queued = ops::list_unprocessed(events, &topic, CONSUMER_GROUP, limit).await?;
        Ok::<_, ServiceError>(queued)
    })
    .await?;
    Ok(Json(messages))
}

pub(crate) async fn topic_detailed_metrics_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> ApiResult<Json<DetailedTopicMetrics>> {
    let detailed = within_timeout(&state, async {
        let (_, connector) = connect_configured(&state).await?;
        let events = connector.events.as_ref();
        let metrics = ops::topic_metrics(events, &topic, CONSUMER_GROUP, Utc::now()).await?;
        let latest = ops::list_messages(events, &topic, 1)
            .await?
            .into_iter()
            .next()
            .and_then(|m| m.timestamp);
        Ok::<_, ServiceError>(DetailedTopicMetrics::derive(&metrics, latest))
    })
    .await?;
    Ok(Json(detailed))
}

/// Rows of a table newest first, with its snapshot metrics.
pub(crate) async fn table_data_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): QueryMap,
) -> ApiResult<Json<TableData>> {
    let limit = parse_limit(&query, LimitBounds::TABLE_ROWS)?;
    let data = within_timeout(&state, async {
        let ident = TableIdent::parse(&name)?;
        let (_, connector) = connect_configured(&state).await?;
        let mut rows = connector.catalog.scan(&ident).await?;
        sort_rows_recent_first(&mut rows);
        rows.truncate(limit);
        let metrics = connector.catalog.metrics(&ident).await?;
        Ok::<_, ServiceError>(TableData { data: rows, metrics })
    })
    .await?;
    Ok(Json(data))
}

pub(crate) async fn table_metrics_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TableMetrics>> {
    let metrics = within_timeout(&state, async {
        let ident = TableIdent::parse(&name)?;
        let (_, connector) = connect_configured(&state).await?;
        Ok::<_, ServiceError>(connector.catalog.metrics(&ident).await?)
    })
    .await?;
    Ok(Json(metrics))
}
