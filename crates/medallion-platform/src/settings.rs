// SPDX-License-Identifier: Apache-2.0

use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogBackend {
    /// Iceberg-style catalog kept in a local SQLite file.
    Local { path: PathBuf },
    /// Polaris Iceberg REST catalog on the cluster.
    Polaris,
}

impl CatalogBackend {
    #[must_use]
    pub fn parse(kind: &str, local_path: PathBuf) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "local" | "sqlite" => Some(Self::Local { path: local_path }),
            "polaris" | "rest" => Some(Self::Polaris),
            _ => None,
        }
    }
}

/// Endpoints and client behavior used to reach the data platform.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub scheme: String,
    pub rest_port: u16,
    pub s3_port: u16,
    pub kafka_rest_port: u16,
    pub catalog_port: u16,
    pub s3_region: String,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub retry: RetryPolicy,
    pub catalog: CatalogBackend,
    pub catalog_name: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            rest_port: 8443,
            s3_port: 9000,
            kafka_rest_port: 8082,
            catalog_port: 8181,
            s3_region: "us-east-1".to_string(),
            probe_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
            retry: RetryPolicy::default(),
            catalog: CatalogBackend::Local {
                path: PathBuf::from("data/catalog.db"),
            },
            catalog_name: "manufacturing".to_string(),
        }
    }
}

impl PlatformSettings {
    #[must_use]
    pub fn base_url(&self, host: &str, port: u16) -> String {
        format!("{}://{}:{}", self.scheme, host.trim(), port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.scheme != "https" && self.scheme != "http" {
            return Err(format!("unsupported platform scheme: {}", self.scheme));
        }
        if self.probe_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err("platform timeouts must be > 0".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("platform retry max_attempts must be > 0".to_string());
        }
        if self.catalog_name.trim().is_empty() {
            return Err("catalog name must not be empty".to_string());
        }
        Ok(())
    }
}
