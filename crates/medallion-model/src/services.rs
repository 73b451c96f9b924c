// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const REST_API_PORT: u16 = 8443;

const DEFAULT_FIX_GUIDANCE: &str = "Check service configuration and network connectivity.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformService {
    pub port: u16,
    pub description: &'static str,
    pub protocol: &'static str,
    pub required: bool,
    pub fix_guidance: &'static str,
}

pub const PLATFORM_SERVICES: [PlatformService; 5] = [
    PlatformService {
        port: REST_API_PORT,
        description: "REST API",
        protocol: "https",
        required: true,
        fix_guidance: "Ensure Data Fabric cluster is running and accessible. Check network connectivity and security settings.",
    },
    PlatformService {
        port: 8080,
        description: "HBase REST",
        protocol: "https",
        required: false,
        fix_guidance: "Enable HBase REST API service on the cluster.",
    },
    PlatformService {
        port: 9000,
        description: "Object Store",
        protocol: "https",
        required: true,
        fix_guidance: "Enable Object Store service and configure S3-compatible endpoint.",
    },
    PlatformService {
        port: 8243,
        description: "Database JSON REST API",
        protocol: "https",
        required: false,
        fix_guidance: "Enable Database JSON REST API service (OJAI).",
    },
    PlatformService {
        port: 8082,
        description: "Kafka REST API",
        protocol: "https",
        required: true,
        fix_guidance: "Enable the Kafka REST API gateway for the cluster.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Success,
    Unauthorized,
    NotRequired,
    Unknown,
}

impl AuthStatus {
    #[must_use]
    pub const fn from_http_status(code: u16) -> Self {
        match code {
            200 => Self::Success,
            401 | 403 => Self::Unauthorized,
            _ => Self::NotRequired,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unauthorized => "unauthorized",
            Self::NotRequired => "not_required",
            Self::Unknown => "unknown",
        }
    }
}

/// Raw outcome of probing one port: TCP reachability, then an authenticated HTTPS GET.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortProbe {
    pub tcp_available: bool,
    pub https_available: bool,
    pub auth_status: AuthStatus,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PortProbe {
    #[must_use]
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            tcp_available: false,
            https_available: false,
            auth_status: AuthStatus::Unknown,
            status_code: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn responded(status_code: u16) -> Self {
        Self {
            tcp_available: true,
            https_available: true,
            auth_status: AuthStatus::from_http_status(status_code),
            status_code: Some(status_code),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Available,
    Missing,
    Misconfigured,
}

impl ServiceState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Missing => "missing",
            Self::Misconfigured => "misconfigured",
        }
    }
}

#[must_use]
pub fn classify(probe: &PortProbe) -> ServiceState {
    if probe.error.is_some() && !probe.tcp_available {
        return ServiceState::Missing;
    }
    match probe.auth_status {
        AuthStatus::Success => ServiceState::Available,
        AuthStatus::Unauthorized => ServiceState::Misconfigured,
        _ if probe.tcp_available || probe.https_available => ServiceState::Available,
        _ => ServiceState::Missing,
    }
}

#[must_use]
pub fn service_slug(description: &str) -> String {
    description.to_lowercase().replace(' ', "_")
}

#[must_use]
pub fn fix_guidance(slug: &str, state: ServiceState) -> Option<String> {
    if state == ServiceState::Available {
        return None;
    }
    let guidance = PLATFORM_SERVICES
        .iter()
        .find(|s| service_slug(s.description) == slug)
        .map_or(DEFAULT_FIX_GUIDANCE, |s| s.fix_guidance);
    Some(guidance.to_string())
}

/// One probed platform service, as rendered in the discovery panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub port: u16,
    pub description: String,
    pub protocol: String,
    pub required: bool,
    pub tcp_available: bool,
    pub https_available: bool,
    pub auth_status: AuthStatus,
    pub status: ServiceState,
    #[serde(default)]
    pub error: Option<String>,
}

impl ServiceDetail {
    #[must_use]
    pub fn from_probe(service: &PlatformService, probe: PortProbe) -> Self {
        let status = classify(&probe);
        Self {
            port: service.port,
            description: service.description.to_string(),
            protocol: service.protocol.to_string(),
            required: service.required,
            tcp_available: probe.tcp_available,
            https_available: probe.https_available,
            auth_status: probe.auth_status,
            status,
            error: probe.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service_name: String,
    pub status: ServiceState,
    pub message: String,
    pub required: bool,
    #[serde(default)]
    pub fix_guidance: Option<String>,
}

impl ServiceStatus {
    #[must_use]
    pub fn from_detail(detail: &ServiceDetail) -> Self {
        let message = detail
            .error
            .clone()
            .unwrap_or_else(|| format!("Port {} - {}", detail.port, detail.auth_status.as_str()));
        let service_name = service_slug(&detail.description);
        Self {
            fix_guidance: fix_guidance(&service_name, detail.status),
            service_name,
            status: detail.status,
            message,
            required: detail.required,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Success,
    Error,
    AuthFailed,
    TlsError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub status: ConnectionStatus,
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ConnectionTestResult {
    /// Maps the REST API port probe onto the connection banner shown by the settings form.
    #[must_use]
    pub fn from_rest_probe(host: &str, probe: &PortProbe) -> Self {
        let (status, message) = match probe.auth_status {
            AuthStatus::Success => (ConnectionStatus::Success, "Connected to Data Fabric REST API"),
            AuthStatus::Unauthorized => (ConnectionStatus::AuthFailed, "Authentication failed"),
            _ => (ConnectionStatus::Error, "Endpoint unreachable"),
        };
        Self {
            status,
            message: message.to_string(),
            details: Some(json!({
                "cluster_info": {"host": host, "port": REST_API_PORT},
                "service": probe,
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub status: String,
    pub message: String,
    pub cluster_info: Value,
    pub services: Vec<ServiceDetail>,
    pub service_statuses: Vec<ServiceStatus>,
}

impl DiscoveryReport {
    #[must_use]
    pub fn from_details(host: &str, services: Vec<ServiceDetail>) -> Self {
        let authenticated = services
            .iter()
            .filter(|s| s.auth_status == AuthStatus::Success)
            .count();
        let service_statuses = services.iter().map(ServiceStatus::from_detail).collect();
        Self {
            status: if authenticated > 0 { "success" } else { "partial" }.to_string(),
            message: format!(
                "Tested {} services, {} authenticated",
                services.len(),
                authenticated
            ),
            cluster_info: json!({"host": host}),
            services,
            service_statuses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessScore {
    pub score: u32,
    pub total_required: usize,
    pub available_required: usize,
    pub services: Vec<ServiceStatus>,
}

impl ReadinessScore {
    #[must_use]
    pub fn compute(services: Vec<ServiceStatus>) -> Self {
        let total_required = services.iter().filter(|s| s.required).count();
        let available_required = services
            .iter()
            .filter(|s| s.required && s.status == ServiceState::Available)
            .count();
        let score = if total_required == 0 {
            0
        } else {
            (available_required as f64 / total_required as f64 * 100.0).round() as u32
        };
        Self {
            score,
            total_required,
            available_required,
            services,
        }
    }
}
