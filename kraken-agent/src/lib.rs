//! kraken-agent library - HTTP control agent for a KrakenSDR
//!
//! Exposes a small JSON API that edits the device's shared settings document
//! and relays its DOA feed. The device itself is never driven directly: it
//! watches `settings.json` and publishes the feed on its own web server.

use axum::Router;
use kraken_common::SettingsStore;
use std::path::PathBuf;
use std::sync::Arc;

pub mod allowlist;
pub mod api;
pub mod error;
pub mod feed;

use allowlist::AllowList;
use api::params::{
    OptimizeShortBurstsRequest, SetCoordinatesRequest, SetFrequencyAndVfoRequest,
    SetFrequencyRequest, SetGainRequest, SetOutputVfoRequest, SetVfoBandwidthRequest,
    SetVfoFrequencyRequest,
};
use feed::DoaFeedClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared settings document
    pub settings: Arc<SettingsStore>,
    /// Source of DOA records
    pub doa_feed: Arc<DoaFeedClient>,
    /// Fixed at startup; empty permits everyone
    pub allow_list: Arc<AllowList>,
    /// Root for direct UI file serving, disabled when `None`
    pub html_dir: Option<PathBuf>,
    pub allow_cors: bool,
    /// Trace every request and response
    pub debug_http: bool,
}

impl AppState {
    /// State with no allow-list, no static serving and CORS on
    pub fn new(settings: SettingsStore, doa_feed: DoaFeedClient) -> Self {
        Self {
            settings: Arc::new(settings),
            doa_feed: Arc::new(doa_feed),
            allow_list: Arc::new(AllowList::allow_all()),
            html_dir: None,
            allow_cors: true,
            debug_http: false,
        }
    }
}

/// Build application router
///
/// The request gate wraps every route and the fallback, so allow-listing and
/// the HEAD/POST handling apply before any endpoint logic.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let router = Router::new()
        .route("/api/krakensdr/get_config", get(api::get_config))
        .route(
            "/api/krakensdr/set_frequency",
            get(api::apply_settings::<SetFrequencyRequest>),
        )
        .route(
            "/api/krakensdr/set_frequency_and_vfo",
            get(api::apply_settings::<SetFrequencyAndVfoRequest>),
        )
        .route(
            "/api/krakensdr/set_gain",
            get(api::apply_settings::<SetGainRequest>),
        )
        .route(
            "/api/krakensdr/set_output_vfo",
            get(api::apply_settings::<SetOutputVfoRequest>),
        )
        .route(
            "/api/krakensdr/en_optimize_short_bursts",
            get(api::apply_settings::<OptimizeShortBurstsRequest>),
        )
        .route(
            "/api/krakensdr/set_vfo_frequency",
            get(api::apply_settings::<SetVfoFrequencyRequest>),
        )
        .route(
            "/api/krakensdr/set_vfo_bandwidth",
            get(api::apply_settings::<SetVfoBandwidthRequest>),
        )
        .route(
            "/api/krakensdr/set_coordinates",
            get(api::apply_settings::<SetCoordinatesRequest>),
        )
        .route("/api/krakensdr/get_doa", get(api::get_doa))
        .merge(api::health_routes())
        .fallback(api::fallback)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::request_gate,
        ));

    let router = router.with_state(state.clone());

    if state.debug_http {
        router.layer(tower_http::trace::TraceLayer::new_for_http())
    } else {
        router
    }
}
