//! Bootstrap configuration
//!
//! The agent's own settings (port, where the device keeps `settings.json`,
//! allow-list, feed location) come from, in priority order:
//! 1. Command-line arguments / environment variables (handled by the binary)
//! 2. TOML config file
//! 3. Compiled defaults
//!
//! Everything here is read once at startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8181;
pub const DEFAULT_SETTINGS_PATH: &str = "/home/krakenrf/krakensdr_doa/krakensdr_doa/_share";
pub const DEFAULT_DOA_HOST: &str = "localhost";
pub const DEFAULT_DOA_PORT: u16 = 8081;
pub const DEFAULT_DOA_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const CONFIG_DIR_NAME: &str = "kraken-agent";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Contents of the bootstrap TOML file
///
/// Every key is optional; absent keys take the compiled default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP listen port (all interfaces)
    pub port: u16,
    /// Directory containing the device's settings.json
    pub settings_path: PathBuf,
    /// Comma-separated IPv4 addresses; empty allows everyone
    pub allowed_ips: String,
    /// Serve UI files from this directory when set
    pub html_dir: Option<PathBuf>,
    /// Log every request/response
    pub debug_http: bool,
    /// Send `Access-Control-Allow-Origin: *` on HEAD responses
    pub allow_cors: bool,
    pub doa_feed: DoaFeedConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            allowed_ips: String::new(),
            html_dir: None,
            debug_http: false,
            allow_cors: true,
            doa_feed: DoaFeedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where the device publishes its DOA CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoaFeedConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for DoaFeedConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DOA_HOST.to_string(),
            port: DEFAULT_DOA_PORT,
            timeout_ms: DEFAULT_DOA_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) for our crates, or a full
    /// filter directive when it contains `=`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the bootstrap config
///
/// An explicit path must exist. Without one the platform locations are
/// searched and a missing file simply means compiled defaults. Returns the
/// file the config came from, if any.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let source = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    match source {
        Some(path) => Ok((load_toml_config(&path)?, Some(path))),
        None => Ok((TomlConfig::default(), None)),
    }
}

/// ~/.config/kraken-agent/config.toml, then /etc/kraken-agent/config.toml
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    let system_config = PathBuf::from("/etc")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| path.is_file())
}
