// SPDX-License-Identifier: Apache-2.0
#![allow(dead_code)]

use medallion_server::{build_router, ApiConfig, AppState, FakeConnectorFactory, StateDb};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub struct TestServer {
    pub addr: SocketAddr,
    pub platform: Arc<FakeConnectorFactory>,
    _state_dir: TempDir,
}

pub async fn spawn_app() -> TestServer {
    spawn_app_with(ApiConfig::default()).await
}

pub async fn spawn_app_with(api: ApiConfig) -> TestServer {
    let state_dir = tempfile::tempdir().expect("tempdir");
    let db = StateDb::open(&state_dir.path().join("state.db")).expect("state db");
    let platform = Arc::new(FakeConnectorFactory::new());
    let state = AppState::new(api, Arc::new(db), platform.clone());
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    TestServer {
        addr,
        platform,
        _state_dir: state_dir,
    }
}

pub async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if let Some(body) = body {
        req.push_str("content-type: application/json\r\n");
        req.push_str(&format!("content-length: {}\r\n\r\n{body}", body.len()));
    } else {
        req.push_str("content-length: 0\r\n\r\n");
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

pub async fn get_json(addr: SocketAddr, path: &str) -> (u16, Value) {
    let (status, _, body) = send_raw(addr, "GET", path, &[], None).await;
    (status, serde_json::from_str(&body).expect("json body"))
}

pub async fn send_empty(addr: SocketAddr, method: &str, path: &str) -> (u16, Value) {
    let (status, _, body) = send_raw(addr, method, path, &[], None).await;
    (status, serde_json::from_str(&body).expect("json body"))
}

pub async fn send_json(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, Value) {
    let (status, _, body) = send_raw(addr, method, path, &[], Some(body)).await;
    (status, serde_json::from_str(&body).expect("json body"))
}

pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

pub const PROFILE_BODY: &str =
    r#"{"name":"Lab","cluster_host":"df.local","username":"mapr","password":"secret"}"#;

pub async fn configure(addr: SocketAddr) {
    let (status, body) = send_json(addr, "PUT", "/profile", PROFILE_BODY).await;
    assert_eq!(status, 200, "profile save failed: {body}");
}

pub async fn configure_and_bootstrap(addr: SocketAddr) {
    configure(addr).await;
    let (status, body) = send_json(addr, "POST", "/profile/bootstrap", "{}").await;
    assert_eq!(status, 200, "bootstrap failed: {body}");
    assert_eq!(body["status"], "success");
}
