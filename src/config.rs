//! Configuration module for the echo server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Port used when none is given or the given one is unusable.
pub const DEFAULT_PORT: u16 = 5000;

/// Worker threads when not configured.
pub const DEFAULT_WORKERS: usize = 8;

/// Pending-connection queue depth of the listening socket.
pub const BACKLOG: i32 = 5;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "v6-echo")]
#[command(version = "0.1.0")]
#[command(about = "An IPv6 TCP echo server with a worker thread pool", long_about = None)]
pub struct CliArgs {
    /// Port to listen on (defaults to 5000)
    pub port: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Idle read timeout per connection in seconds (0 = no timeout)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: Option<u16>,
    /// Number of worker threads
    pub workers: Option<usize>,
}

/// Per-connection configuration
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Idle read timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: default_read_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_read_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the listening port came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSource {
    /// Nothing supplied.
    Default,
    /// Positional command-line argument.
    Argument,
    /// `[server] port` in the config file.
    File,
    /// Supplied but unusable (zero, malformed, out of range); the default
    /// port is used instead.
    Invalid(String),
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub port_source: PortSource,
    pub workers: usize,
    pub read_timeout: Option<Duration>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they name, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let (port, port_source) = match (cli.port.as_deref(), toml_config.server.port) {
            (Some(arg), _) => match parse_port(arg) {
                Some(port) => (port, PortSource::Argument),
                None => (DEFAULT_PORT, PortSource::Invalid(arg.to_string())),
            },
            (None, Some(0)) => (DEFAULT_PORT, PortSource::Invalid("0".to_string())),
            (None, Some(port)) => (port, PortSource::File),
            (None, None) => (DEFAULT_PORT, PortSource::Default),
        };

        let read_timeout_secs = cli
            .read_timeout
            .unwrap_or(toml_config.connection.read_timeout_secs);

        Ok(Config {
            port,
            port_source,
            workers: cli
                .workers
                .or(toml_config.server.workers)
                .unwrap_or(DEFAULT_WORKERS),
            read_timeout: (read_timeout_secs > 0).then(|| Duration::from_secs(read_timeout_secs)),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Parse a decimal port number. Zero is not a usable listening port here.
pub fn parse_port(arg: &str) -> Option<u16> {
    match arg.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
