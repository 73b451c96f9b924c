// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Medallion model SSOT.
//!
//! Records shared by the platform clients and the HTTP service, plus the pure
//! rules that classify services, score readiness, validate telemetry and
//! aggregate KPIs.
//!
//! ```compile_fail
//! use medallion_model::ServiceState;
//!
//! fn exhaustive_match(s: ServiceState) -> &'static str {
//!     match s {
//!         ServiceState::Available => "a",
//!         ServiceState::Missing => "m",
//!     }
//! }
//! ```

mod dashboard;
mod lifecycle;
mod medallion;
mod metrics;
mod profile;
mod services;
mod tables;
mod telemetry;

pub use dashboard::DashboardData;
pub use lifecycle::{
    BootstrapResult, BootstrapState, DemoEvent, ProvisionKind, ProvisionResult, ProvisionStatus,
    ScenarioKind, ScenarioRequest, ScenarioResult,
};
pub use medallion::{
    evaluate_readiness, table_matches, Layer, LayerReadiness, LayerStatus, BRONZE_BUCKET,
    CLEANSED_TABLE, CONSUMER_GROUP, GOLD_BUCKET, KPI_TABLE, RAW_TOPIC, RAW_TOPIC_PARTITIONS,
    RAW_TOPIC_REPLICATION, SILVER_BUCKET,
};
pub use metrics::{
    sort_rows_recent_first, BucketDetail, BucketSummary, DetailedTopicMetrics, ObjectSummary,
    TableData, TableMetrics, TableSummary, TopicMessage, TopicMetrics, TopicSummary,
};
pub use profile::{
    ConnectionProfile, PolarisCredentials, ProfileUpdate, S3Credentials, DEFAULT_PROFILE_ID,
    DEFAULT_PROFILE_NAME, S3_CREDENTIAL_REFRESH_MARGIN_MS,
};
pub use services::{
    classify, fix_guidance, service_slug, AuthStatus, ConnectionStatus, ConnectionTestResult,
    DiscoveryReport, PlatformService, PortProbe, ReadinessScore, ServiceDetail, ServiceState,
    ServiceStatus, PLATFORM_SERVICES, REST_API_PORT,
};
pub use tables::{cleansed_schema, kpi_schema, FieldType, SchemaField, TableIdent, TableSchema};
pub use telemetry::{
    compute_kpis, generate_events, validate_telemetry, KpiRecord, TelemetryRecord,
    ValidationIssue, DEVICES, TELEMETRY_REQUIRED_KEYS,
};

pub const CRATE_NAME: &str = "medallion-model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}
