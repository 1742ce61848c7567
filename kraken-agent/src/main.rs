//! kraken-agent - KrakenSDR HTTP Control Agent
//!
//! Serves the JSON control API on all interfaces (default port 8181).
//!
//! Exit codes: 1 for an unusable settings path, config file or listen port,
//! 3 for a malformed allow-list.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use kraken_agent::allowlist::AllowList;
use kraken_agent::error::StartupError;
use kraken_agent::feed::DoaFeedClient;
use kraken_agent::{build_router, AppState};
use kraken_common::config::{resolve_config, TomlConfig};
use kraken_common::SettingsStore;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for kraken-agent
///
/// Anything not given here falls back to the TOML config, then to the
/// compiled defaults.
#[derive(Parser, Debug)]
#[command(name = "kraken-agent")]
#[command(about = "KrakenSDR HTTP Control Agent")]
#[command(version)]
struct Args {
    /// Port for HTTP server to listen on [default: 8181]
    #[arg(long, env = "KRAKEN_AGENT_PORT")]
    port: Option<u16>,

    /// Directory containing settings.json
    #[arg(long, env = "KRAKEN_SETTINGS_PATH")]
    settings_path: Option<PathBuf>,

    /// IP addresses allowed to connect, comma-separated. Default is any.
    #[arg(long, env = "KRAKEN_ALLOWED_IPS")]
    allowedips: Option<String>,

    /// Log each HTTP request and response
    #[arg(long)]
    debug_http: bool,

    /// Serve UI files (html, js, css, images...) from this directory
    #[arg(long, env = "KRAKEN_HTML_DIR")]
    html_dir: Option<PathBuf>,

    /// Host serving the DOA feed [default: localhost]
    #[arg(long)]
    doa_host: Option<String>,

    /// Port of the DOA feed web server [default: 8081]
    #[arg(long)]
    doa_port: Option<u16>,

    /// DOA feed request timeout in milliseconds [default: 5000]
    #[arg(long)]
    doa_timeout_ms: Option<u64>,

    /// Omit Access-Control-Allow-Origin on HEAD responses
    #[arg(long)]
    no_cors: bool,

    /// TOML config file
    #[arg(long, env = "KRAKEN_AGENT_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    /// Overlay command-line values onto the file config
    fn apply_to(self, mut config: TomlConfig) -> TomlConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = self.settings_path {
            config.settings_path = path;
        }
        if let Some(ips) = self.allowedips {
            config.allowed_ips = ips;
        }
        if self.debug_http {
            config.debug_http = true;
        }
        if let Some(dir) = self.html_dir {
            config.html_dir = Some(dir);
        }
        if let Some(host) = self.doa_host {
            config.doa_feed.host = host;
        }
        if let Some(port) = self.doa_port {
            config.doa_feed.port = port;
        }
        if let Some(timeout) = self.doa_timeout_ms {
            config.doa_feed.timeout_ms = timeout;
        }
        if self.no_cors {
            config.allow_cors = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let (file_config, source) = match resolve_config(args.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            // Logging is not up yet; the config decides its level
            eprintln!("ERROR: {}", e);
            return ExitCode::from(StartupError::Config(e).exit_code());
        }
    };
    let config = args.apply_to(file_config);

    init_tracing(&config);

    info!(
        "Starting KrakenSDR control agent (kraken-agent) v{}",
        env!("CARGO_PKG_VERSION")
    );
    match &source {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Filter for the configured `logging.level`
///
/// A bare level applies to our crates; anything with `=` is taken as a
/// complete filter directive.
fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') {
        level.to_string()
    } else {
        format!("kraken_agent={0},kraken_common={0}", level)
    }
}

/// RUST_LOG wins; otherwise the configured level for our crates
fn init_tracing(config: &TomlConfig) {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.logging.level)));
    if config.debug_http {
        if let Ok(directive) = "tower_http=debug".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: TomlConfig) -> Result<(), StartupError> {
    let allow_list = AllowList::parse(&config.allowed_ips)?;
    if allow_list.is_empty() {
        info!("Allowed IPs: any");
    } else {
        info!("Allowed IPs: {:?}", allow_list.addresses());
    }

    let settings =
        SettingsStore::open(&config.settings_path).map_err(|source| StartupError::Settings {
            path: config.settings_path.clone(),
            source,
        })?;
    info!("Settings document: {}", settings.path().display());

    let doa_feed = DoaFeedClient::new(&config.doa_feed).map_err(StartupError::DoaFeed)?;
    info!("DOA feed: {}", doa_feed.feed_url(doa_feed.host()));

    if let Some(dir) = &config.html_dir {
        if dir.is_dir() {
            info!("Serving UI files from {}", dir.display());
        } else {
            warn!("UI directory {} does not exist", dir.display());
        }
    }

    let mut state = AppState::new(settings, doa_feed);
    state.allow_list = std::sync::Arc::new(allow_list);
    state.html_dir = config.html_dir.clone();
    state.allow_cors = config.allow_cors;
    state.debug_http = config.debug_http;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            port: config.port,
            source,
        })?;
    info!("Starting agent on port {}", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(StartupError::Serve)?;

    info!("Agent stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(flags: &[&str]) -> Args {
        let argv = std::iter::once("kraken-agent").chain(flags.iter().copied());
        Args::try_parse_from(argv).unwrap()
    }

    fn file_config() -> TomlConfig {
        let mut config = TomlConfig::default();
        config.port = 7000;
        config.settings_path = PathBuf::from("/srv/kraken/_share");
        config.allowed_ips = "10.0.0.5".to_string();
        config.doa_feed.host = "kraken.local".to_string();
        config.doa_feed.port = 9081;
        config
    }

    #[test]
    fn flags_override_file_values() {
        let config = args(&[
            "--port",
            "9000",
            "--settings-path",
            "/tmp/share",
            "--allowedips",
            "10.0.0.9",
            "--doa-host",
            "127.0.0.1",
            "--doa-timeout-ms",
            "250",
        ])
        .apply_to(file_config());

        assert_eq!(config.port, 9000);
        assert_eq!(config.settings_path, PathBuf::from("/tmp/share"));
        assert_eq!(config.allowed_ips, "10.0.0.9");
        assert_eq!(config.doa_feed.host, "127.0.0.1");
        assert_eq!(config.doa_feed.timeout_ms, 250);
        // Not given on the command line
        assert_eq!(config.doa_feed.port, 9081);
    }

    #[test]
    fn unset_flags_keep_file_values() {
        let config = args(&[]).apply_to(file_config());
        assert_eq!(config, file_config());
    }

    #[test]
    fn unset_flags_keep_defaults_without_file() {
        let config = args(&[]).apply_to(TomlConfig::default());
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn switches_only_turn_their_setting_on() {
        let config = args(&["--no-cors", "--debug-http"]).apply_to(TomlConfig::default());
        assert!(!config.allow_cors);
        assert!(config.debug_http);

        let mut file = TomlConfig::default();
        file.allow_cors = false;
        file.debug_http = true;
        let config = args(&[]).apply_to(file);
        assert!(!config.allow_cors);
        assert!(config.debug_http);
    }

    #[test]
    fn html_dir_flag_enables_static_serving() {
        let config = args(&["--html-dir", "/var/www/kraken"]).apply_to(file_config());
        assert_eq!(config.html_dir, Some(PathBuf::from("/var/www/kraken")));
    }

    #[test]
    fn bare_level_applies_to_our_crates() {
        assert_eq!(
            filter_directives("debug"),
            "kraken_agent=debug,kraken_common=debug"
        );
    }

    #[test]
    fn full_directive_passes_through() {
        assert_eq!(
            filter_directives("kraken_agent=debug,tower_http=trace"),
            "kraken_agent=debug,tower_http=trace"
        );
        assert!(EnvFilter::try_new(filter_directives("kraken_agent=debug")).is_ok());
    }
}
