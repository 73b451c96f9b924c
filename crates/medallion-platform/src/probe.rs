// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use medallion_model::PortProbe;
use reqwest::Client;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[async_trait]
pub trait Prober: Send + Sync + 'static {
    async fn probe(&self, target: &ProbeTarget) -> PortProbe;
}

/// TCP connect followed by an authenticated HTTP(S) GET on `/`.
pub struct NetworkProber {
    client: Client,
    scheme: String,
    connect_timeout: Duration,
}

impl NetworkProber {
    #[must_use]
    pub fn new(client: Client, scheme: &str, connect_timeout: Duration) -> Self {
        Self {
            client,
            scheme: scheme.to_string(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, target: &ProbeTarget) -> PortProbe {
        let addr = format!("{}:{}", target.host, target.port);
        match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_stream)) => {}
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::ConnectionRefused => {
                return PortProbe::unreachable("TCP connection refused");
            }
            Ok(Err(err)) => return PortProbe::unreachable(format!("TCP error: {err}")),
            Err(_) => return PortProbe::unreachable("TCP error: timed out"),
        }

        let url = format!("{}://{addr}/", self.scheme);
        let mut req = self.client.get(&url);
        if let (Some(user), Some(pass)) = (target.username.as_deref(), target.password.as_deref())
        {
            if !user.is_empty() && !pass.is_empty() {
                req = req.basic_auth(user, Some(pass));
            }
        }
        match req.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                debug!(port = target.port, status, "service probe answered");
                PortProbe::responded(status)
            }
            Err(err) => {
                let mut probe = PortProbe::unreachable(format!("HTTPS test error: {err}"));
                probe.tcp_available = true;
                probe
            }
        }
    }
}
