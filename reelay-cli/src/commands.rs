//! CLI command implementations

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use reelay_core::ReelayConfig;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory to serve media files from
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Console log level
        #[arg(long, default_value = "info")]
        log_level: CliLogLevel,
    },
}

/// Console log levels for user control
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts the CLI log level to the tracing Level enum.
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            root,
            log_level,
        } => serve(host, port, root, log_level).await,
    }
}

/// Start the streaming server.
///
/// Configuration precedence: CLI flags over `REELAY_*` environment
/// variables over built-in defaults.
///
/// # Errors
/// Fails when the media root is missing or the listener cannot bind.
async fn serve(
    host: Option<String>,
    port: Option<u16>,
    root: Option<PathBuf>,
    log_level: CliLogLevel,
) -> anyhow::Result<()> {
    init_tracing(log_level);

    let mut config = ReelayConfig::from_env();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(root) = root {
        config.server.media_root = root;
    }

    reelay_web::run_server(config).await?;
    Ok(())
}

fn init_tracing(log_level: CliLogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
