// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub state_db_path: PathBuf,
    /// Exact origins allowed by CORS; `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub llm_timeout: Duration,
    /// Events produced by one `simulate_ingestion` run.
    pub ingest_batch_size: usize,
    /// Upper bound of records one `process_data` run consumes.
    pub consume_max_records: usize,
    /// Newest cleansed rows aggregated by one `curate_data` run.
    pub curate_window_rows: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            state_db_path: PathBuf::from("data/medallion.db"),
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            max_body_bytes: 256 * 1024,
            request_timeout: Duration::from_secs(60),
            llm_timeout: Duration::from_secs(60),
            ingest_batch_size: 100,
            consume_max_records: 500,
            curate_window_rows: 500,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.cors_allowed_origins
            .iter()
            .any(|x| x == "*" || x == origin)
    }
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.bind_addr.trim().is_empty() {
        return Err("bind address must not be empty".to_string());
    }
    if api.max_body_bytes == 0 {
        return Err("api size limits must be > 0".to_string());
    }
    if api.request_timeout.is_zero() || api.llm_timeout.is_zero() {
        return Err("timeouts must be > 0".to_string());
    }
    if api.ingest_batch_size == 0 || api.consume_max_records == 0 || api.curate_window_rows == 0
    {
        return Err("scenario batch limits must be > 0".to_string());
    }
    if api.state_db_path.as_os_str().is_empty() {
        return Err("state db path must not be empty".to_string());
    }
    Ok(())
}
