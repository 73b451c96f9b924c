// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionKind {
    Bucket,
    Topic,
    Table,
}

impl ProvisionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Topic => "topic",
            Self::Table => "table",
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::Bucket => "Bucket",
            Self::Topic => "Topic",
            Self::Table => "Table",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    Created,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResult {
    pub kind: ProvisionKind,
    pub name: String,
    pub outcome: ProvisionStatus,
    pub message: String,
}

impl ProvisionResult {
    #[must_use]
    pub fn created(kind: ProvisionKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            outcome: ProvisionStatus::Created,
            message: format!("{} {name} created", kind.title()),
        }
    }

    #[must_use]
    pub fn skipped(kind: ProvisionKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            outcome: ProvisionStatus::Skipped,
            message: format!("{} {name} exists", kind.title()),
        }
    }

    #[must_use]
    pub fn failed(kind: ProvisionKind, name: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            outcome: ProvisionStatus::Failed,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn checking_line(kind: ProvisionKind, name: &str) -> String {
        format!("Checking {}: {name}...", kind.as_str())
    }

    #[must_use]
    pub fn log_line(&self) -> String {
        match self.outcome {
            ProvisionStatus::Created => {
                format!("✓ {} {} created successfully", self.kind.title(), self.name)
            }
            ProvisionStatus::Skipped => format!(
                "→ {} {} already exists, skipping",
                self.kind.title(),
                self.name
            ),
            ProvisionStatus::Failed => format!(
                "✕ Failed to create {} {}: {}",
                self.kind.as_str(),
                self.name,
                self.message
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapResult {
    pub status: String,
    pub buckets: Vec<ProvisionResult>,
    pub topics: Vec<ProvisionResult>,
    pub tables: Vec<ProvisionResult>,
    pub logs: Vec<String>,
}

impl BootstrapResult {
    #[must_use]
    pub fn new(
        buckets: Vec<ProvisionResult>,
        topics: Vec<ProvisionResult>,
        tables: Vec<ProvisionResult>,
        logs: Vec<String>,
    ) -> Self {
        let any_failed = buckets
            .iter()
            .chain(&topics)
            .chain(&tables)
            .any(|r| r.outcome == ProvisionStatus::Failed);
        Self {
            status: if any_failed { "partial" } else { "success" }.to_string(),
            buckets,
            topics,
            tables,
            logs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapState {
    pub bootstrapped: bool,
    #[serde(default)]
    pub topics_created: u32,
    #[serde(default)]
    pub tables_created: u32,
    #[serde(default)]
    pub bootstrapped_at: Option<String>,
}

impl BootstrapState {
    #[must_use]
    pub fn pending() -> Self {
        Self {
            bootstrapped: false,
            topics_created: 0,
            tables_created: 0,
            bootstrapped_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    IotStreaming,
    SimulateIngestion,
    ProcessData,
    CurateData,
}

impl ScenarioKind {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "iot_streaming" => Ok(Self::IotStreaming),
            "simulate_ingestion" => Ok(Self::SimulateIngestion),
            "process_data" => Ok(Self::ProcessData),
            "curate_data" => Ok(Self::CurateData),
            other => Err(ValidationError(format!("Unknown scenario type: {other}"))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IotStreaming => "iot_streaming",
            Self::SimulateIngestion => "simulate_ingestion",
            Self::ProcessData => "process_data",
            Self::CurateData => "curate_data",
        }
    }
}

impl Display for ScenarioKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub scenario_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub status: String,
    pub message: String,
    pub logs: Vec<String>,
    pub data_generated: Map<String, Value>,
    pub invalidated_count: u64,
}

impl ScenarioResult {
    #[must_use]
    pub fn completed(
        kind: ScenarioKind,
        logs: Vec<String>,
        data_generated: Map<String, Value>,
        invalidated_count: u64,
    ) -> Self {
        Self {
            status: "success".to_string(),
            message: format!("Scenario {kind} completed successfully"),
            logs,
            data_generated,
            invalidated_count,
        }
    }
}

/// One persisted line of bootstrap or scenario output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoEvent {
    pub id: i64,
    pub profile_id: String,
    pub category: String,
    pub message: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_log_lines_match_console_format() {
        assert_eq!(
            ProvisionResult::checking_line(ProvisionKind::Bucket, "bronze-bucket"),
            "Checking bucket: bronze-bucket..."
        );
        assert_eq!(
            ProvisionResult::created(ProvisionKind::Bucket, "bronze-bucket").log_line(),
            "✓ Bucket bronze-bucket created successfully"
        );
        assert_eq!(
            ProvisionResult::skipped(ProvisionKind::Topic, "t").log_line(),
            "→ Topic t already exists, skipping"
        );
        assert_eq!(
            ProvisionResult::failed(ProvisionKind::Table, "x.y", "denied").log_line(),
            "✕ Failed to create table x.y: denied"
        );
    }

    #[test]
    fn bootstrap_status_reflects_failures() {
        let ok = BootstrapResult::new(
            vec![ProvisionResult::created(ProvisionKind::Bucket, "b")],
            vec![ProvisionResult::skipped(ProvisionKind::Topic, "t")],
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(ok.status, "success");
        let partial = BootstrapResult::new(
            Vec::new(),
            Vec::new(),
            vec![ProvisionResult::failed(ProvisionKind::Table, "t", "x")],
            Vec::new(),
        );
        assert_eq!(partial.status, "partial");
    }

    #[test]
    fn scenario_kind_parses_known_types() {
        assert_eq!(
            ScenarioKind::parse("iot_streaming").expect("kind"),
            ScenarioKind::IotStreaming
        );
        assert_eq!(
            ScenarioKind::parse("curate_data").expect("kind"),
            ScenarioKind::CurateData
        );
        let err = ScenarioKind::parse("replay").expect_err("unknown");
        assert_eq!(err.0, "Unknown scenario type: replay");
    }

    #[test]
    fn scenario_result_message_names_kind() {
        let result =
            ScenarioResult::completed(ScenarioKind::ProcessData, Vec::new(), Map::new(), 2);
        assert_eq!(result.message, "Scenario process_data completed successfully");
        assert_eq!(result.invalidated_count, 2);
    }
}
