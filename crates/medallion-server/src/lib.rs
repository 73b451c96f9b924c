// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! HTTP service for the medallion pipeline demo.
//!
//! The router exposes the connection profile, service discovery, one-shot
//! bootstrap of the Bronze/Silver/Gold resources, scenario runs and read-only
//! views over buckets, topics and tables. Platform access goes through a
//! [`ConnectorFactory`]; local state lives in a [`StateDb`].

mod config;
mod connectors;
mod http;
mod middleware;
mod services;
mod store;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

pub use config::{validate_startup_config_contract, ApiConfig, CONFIG_SCHEMA_VERSION};
pub use connectors::{Connected, ConnectorFactory, FakeConnectorFactory, LiveConnectorFactory};
pub use store::state_db::{StateDb, StateError};

pub const CRATE_NAME: &str = "medallion-server";

#[derive(Clone)]
pub struct AppState {
    pub api: ApiConfig,
    pub(crate) db: Arc<StateDb>,
    pub(crate) connectors: Arc<dyn ConnectorFactory>,
    pub(crate) llm_client: reqwest::Client,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(api: ApiConfig, db: Arc<StateDb>, connectors: Arc<dyn ConnectorFactory>) -> Self {
        Self {
            api,
            db,
            connectors,
            llm_client: reqwest::Client::new(),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }

    #[must_use]
    pub fn platform_mode(&self) -> &'static str {
        self.connectors.mode()
    }
}

pub fn build_router(state: AppState) -> Router {
    use http::{debug_endpoints as dbg, llm_endpoints as llm, profile_endpoints as profile};
    use http::resource_endpoints as res;

    Router::new()
        .route("/health", get(http::health_handler))
        .route("/openapi.json", get(http::openapi_handler))
        .route(
            "/profile",
            get(profile::get_profile_handler)
                .put(profile::put_profile_handler)
                .delete(profile::delete_profile_handler),
        )
        .route("/profile/test", post(profile::test_profile_handler))
        .route("/profile/services", get(profile::services_handler))
        .route("/profile/readiness", get(profile::readiness_handler))
        .route("/profile/s3credentials", get(profile::s3_credentials_handler))
        .route("/profile/events", get(profile::events_handler))
        .route("/profile/bootstrap", post(profile::bootstrap_handler))
        .route(
            "/profile/bootstrap/status",
            get(profile::bootstrap_status_handler),
        )
        .route("/profile/scenarios/run", post(profile::scenario_handler))
        .route("/dashboard/data", get(res::dashboard_handler))
        .route("/buckets/:name/objects", get(res::bucket_objects_handler))
        .route("/topics/:name/metrics", get(res::topic_metrics_handler))
        .route("/topics/:name/messages", get(res::topic_messages_handler))
        .route("/topics/:name/queue", get(res::topic_queue_handler))
        .route(
            "/topics/:name/detailed-metrics",
            get(res::topic_detailed_metrics_handler),
        )
        .route("/tables/:name/data", get(res::table_data_handler))
        .route("/tables/:name/metrics", get(res::table_metrics_handler))
        .route("/llm/chat", post(llm::llm_chat_handler))
        .route("/debug/tables", get(dbg::debug_tables_handler))
        .route("/debug/table/:name", get(dbg::debug_table_rows_handler))
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::cors::cors_middleware,
        ))
        .with_state(state)
}
