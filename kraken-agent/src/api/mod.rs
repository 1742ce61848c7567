//! HTTP API handlers for kraken-agent

pub mod doa;
pub mod envelope;
pub mod gate;
pub mod health;
pub mod params;
pub mod settings;
pub mod static_files;

pub use doa::get_doa;
pub use envelope::{ApiError, Envelope, ErrorKind};
pub use gate::request_gate;
pub use health::health_routes;
pub use settings::{apply_settings, get_config};
pub use static_files::fallback;
