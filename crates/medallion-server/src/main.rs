#![forbid(unsafe_code)]

use medallion_platform::{CatalogBackend, PlatformSettings, RetryPolicy};
use medallion_server::{
    build_router, validate_startup_config_contract, ApiConfig, AppState, ConnectorFactory,
    FakeConnectorFactory, LiveConnectorFactory, StateDb,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    Duration::from_millis(env_u64(name, default.as_millis() as u64))
}

fn env_list(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("signal handlers unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn,rusqlite=warn"));
    if env_bool("MEDALLION_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn platform_settings() -> Result<PlatformSettings, String> {
    let defaults = PlatformSettings::default();
    let catalog_path = PathBuf::from(
        env::var("MEDALLION_CATALOG_DB").unwrap_or_else(|_| "data/catalog.db".to_string()),
    );
    let catalog = match env::var("MEDALLION_CATALOG_BACKEND") {
        Ok(kind) => CatalogBackend::parse(&kind, catalog_path)
            .ok_or_else(|| format!("unsupported MEDALLION_CATALOG_BACKEND: {kind}"))?,
        Err(_) => CatalogBackend::Local { path: catalog_path },
    };
    Ok(PlatformSettings {
        scheme: env::var("MEDALLION_PLATFORM_SCHEME").unwrap_or(defaults.scheme),
        rest_port: env_u16("MEDALLION_REST_PORT", defaults.rest_port),
        s3_port: env_u16("MEDALLION_S3_PORT", defaults.s3_port),
        kafka_rest_port: env_u16("MEDALLION_KAFKA_REST_PORT", defaults.kafka_rest_port),
        catalog_port: env_u16("MEDALLION_CATALOG_PORT", defaults.catalog_port),
        s3_region: env::var("MEDALLION_S3_REGION").unwrap_or(defaults.s3_region),
        probe_timeout: env_duration_ms("MEDALLION_PROBE_TIMEOUT_MS", defaults.probe_timeout),
        request_timeout: env_duration_ms(
            "MEDALLION_PLATFORM_TIMEOUT_MS",
            defaults.request_timeout,
        ),
        accept_invalid_certs: env_bool(
            "MEDALLION_ACCEPT_INVALID_CERTS",
            defaults.accept_invalid_certs,
        ),
        retry: RetryPolicy {
            max_attempts: env_usize("MEDALLION_RETRY_ATTEMPTS", defaults.retry.max_attempts),
            base_backoff_ms: env_u64("MEDALLION_RETRY_BASE_MS", defaults.retry.base_backoff_ms),
        },
        catalog,
        catalog_name: env::var("MEDALLION_CATALOG_NAME").unwrap_or(defaults.catalog_name),
    })
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let defaults = ApiConfig::default();
    let api_cfg = ApiConfig {
        bind_addr: env::var("MEDALLION_BIND").unwrap_or_else(|_| defaults.bind_addr.clone()),
        state_db_path: env::var("MEDALLION_STATE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| defaults.state_db_path.clone()),
        cors_allowed_origins: env_list("MEDALLION_CORS_ORIGINS")
            .unwrap_or_else(|| defaults.cors_allowed_origins.clone()),
        max_body_bytes: env_usize("MEDALLION_MAX_BODY_BYTES", defaults.max_body_bytes),
        request_timeout: env_duration_ms("MEDALLION_REQUEST_TIMEOUT_MS", defaults.request_timeout),
        llm_timeout: env_duration_ms("MEDALLION_LLM_TIMEOUT_MS", defaults.llm_timeout),
        ingest_batch_size: env_usize("MEDALLION_INGEST_BATCH_SIZE", defaults.ingest_batch_size),
        consume_max_records: env_usize(
            "MEDALLION_CONSUME_MAX_RECORDS",
            defaults.consume_max_records,
        ),
        curate_window_rows: env_usize("MEDALLION_CURATE_WINDOW_ROWS", defaults.curate_window_rows),
    };
    validate_startup_config_contract(&api_cfg)?;

    let connectors: Arc<dyn ConnectorFactory> =
        match env::var("MEDALLION_PLATFORM_MODE").as_deref() {
            Ok("fake") => {
                warn!("running against the in-memory platform; nothing reaches a cluster");
                Arc::new(FakeConnectorFactory::new())
            }
            Ok("live") | Err(_) => Arc::new(
                LiveConnectorFactory::new(platform_settings()?)
                    .map_err(|e| format!("platform setup failed: {e}"))?,
            ),
            Ok(other) => return Err(format!("unsupported MEDALLION_PLATFORM_MODE: {other}")),
        };
    let db = StateDb::open(&api_cfg.state_db_path)
        .map_err(|e| format!("state db {}: {e}", api_cfg.state_db_path.display()))?;

    let bind_addr = api_cfg.bind_addr.clone();
    let state = AppState::new(api_cfg, Arc::new(db), connectors);
    let platform_mode = state.platform_mode();
    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!(platform_mode, "medallion-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {e}"))
}
