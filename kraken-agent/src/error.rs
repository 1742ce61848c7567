//! Startup errors and their process exit codes

use crate::allowlist::AllowListError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop the agent before or while serving
#[derive(Debug, Error)]
pub enum StartupError {
    /// Bootstrap TOML missing (when named explicitly) or malformed
    #[error("{0}")]
    Config(kraken_common::Error),

    #[error(
        "The specified settings.json path {} is not usable ({source}). If you know where it is, set it with --settings-path.",
        path.display()
    )]
    Settings {
        path: PathBuf,
        source: kraken_common::Error,
    },

    #[error(transparent)]
    AllowList(#[from] AllowListError),

    #[error("DOA feed client: {0}")]
    DoaFeed(kraken_common::Error),

    #[error("Unable to bind to port {port}. {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

impl StartupError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::AllowList(_) => 3,
            _ => 1,
        }
    }
}
