use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "dockwire")]
#[command(about = "dockwire - talk to the Docker Engine API over its Unix socket")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// Falls back to RUST_LOG, then 'warn'
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/dockwire/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Daemon address (overrides DOCKER_HOST and the config file)
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Engine API version to request (overrides DOCKER_API_VERSION)
    #[arg(long, global = true)]
    pub api_version: Option<String>,

    /// Socket timeout in seconds, 0 = no timeout
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

impl Cli {
    /// Effective log level from flags; `None` defers to RUST_LOG
    pub fn level_filter(&self) -> Option<LevelFilter> {
        match (self.log_level, self.verbose) {
            (Some(level), _) => Some(level.into()),
            (None, true) => Some(LevelFilter::DEBUG),
            (None, false) => None,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the daemon is reachable
    Ping,

    /// Show daemon version information
    Version,

    /// Show system-wide daemon information
    Info,

    /// List containers
    Ps {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },

    /// Show disk usage (API 1.25+)
    Df,

    /// Talk to docker-credential-* helpers
    #[command(subcommand)]
    Credentials(CredentialsCommand),
}

#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    /// Print the credentials stored for SERVER
    Get {
        #[command(flatten)]
        helper: HelperArg,
        server: String,
    },

    /// Store credentials for SERVER; the secret is read from stdin
    Store {
        #[command(flatten)]
        helper: HelperArg,
        server: String,
        #[arg(short, long)]
        username: String,
    },

    /// Remove the credentials stored for SERVER
    Erase {
        #[command(flatten)]
        helper: HelperArg,
        server: String,
    },

    /// List servers and usernames known to the helper
    List {
        #[command(flatten)]
        helper: HelperArg,
    },

    /// Resolve the helper for REGISTRY from ~/.docker/config.json and query it
    Lookup { registry: String },
}

#[derive(Debug, Clone, Args)]
pub struct HelperArg {
    /// Helper suffix, e.g. `pass` for docker-credential-pass
    /// (defaults to credentials_store or credsStore)
    #[arg(long)]
    pub helper: Option<String>,
}
