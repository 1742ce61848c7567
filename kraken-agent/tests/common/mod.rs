//! Shared fixtures for router tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::Request,
    response::Response,
    Router,
};
use kraken_agent::feed::DoaFeedClient;
use kraken_agent::{build_router, AppState};
use kraken_common::config::DoaFeedConfig;
use kraken_common::SettingsStore;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const SETTINGS_FIXTURE: &str = r#"{
    "center_freq": 416.588,
    "uniform_gain": 15.7,
    "output_vfo": 0,
    "vfo_freq_0": 416588000,
    "vfo_bw_0": 12500,
    "en_optimize_short_bursts": false,
    "latitude": 0.0,
    "longitude": 0.0,
    "station_id": "NODE7"
}"#;

/// Test helper: settings directory holding the fixture document
pub fn settings_dir() -> TempDir {
    let dir = TempDir::new().expect("Should create temp dir");
    std::fs::write(dir.path().join("settings.json"), SETTINGS_FIXTURE)
        .expect("Should write settings fixture");
    dir
}

/// Test helper: port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Should bind");
    listener.local_addr().expect("Should have address").port()
}

/// Test helper: state with the feed pointed at `feed_port` on loopback
pub fn test_state(dir: &Path, feed_port: u16) -> AppState {
    let settings = SettingsStore::open(dir).expect("Should open settings");
    let feed = DoaFeedClient::new(&DoaFeedConfig {
        host: "127.0.0.1".to_string(),
        port: feed_port,
        timeout_ms: 1000,
    })
    .expect("Should build feed client");
    AppState::new(settings, feed)
}

/// Test helper: router plus a handle on its settings store
pub fn setup_app(dir: &Path) -> (Router, Arc<SettingsStore>) {
    let state = test_state(dir, closed_port());
    let store = state.settings.clone();
    (build_router(state), store)
}

/// Test helper: GET request
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

/// Test helper: Extract JSON body from response
pub async fn extract_json(response: Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Test helper: current document on disk
pub fn read_document(dir: &Path) -> Value {
    let content =
        std::fs::read_to_string(dir.join("settings.json")).expect("Should read settings");
    serde_json::from_str(&content).expect("Should parse settings")
}
