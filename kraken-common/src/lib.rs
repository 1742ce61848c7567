//! # Kraken Common Library
//!
//! Device-facing pieces shared by the KrakenSDR control agent:
//! - Settings document access (read, batched update, atomic rewrite)
//! - DOA feed CSV parsing into measurement records
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod doa;
pub mod error;
pub mod settings;

pub use doa::DoaRecord;
pub use error::{Error, Result};
pub use settings::{Coordinates, SettingsDocument, SettingsStore, SettingsUpdate};
