//! Configuration module for the lineframe server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "lineframe")]
#[command(author = "lineframe authors")]
#[command(version = "0.1.0")]
#[command(about = "A line-framed TCP server answering with JSON envelopes", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (e.g., :8000 or 127.0.0.1:8000)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// How incoming lines are interpreted
    #[arg(short = 'p', long, value_enum)]
    pub protocol: Option<ProtocolType>,

    /// Seconds a single read may wait before the connection is dropped (0 = never)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Longest line accepted, in bytes (0 = unlimited)
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// What the accept loop does when accepting a connection fails
    #[arg(long, value_enum)]
    pub accept_errors: Option<AcceptPolicy>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Request interpreter selected for every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// HTTP/1.1 request line plus `key: value` headers, ended by a blank line.
    #[default]
    Head,
    /// Every line is its own request and is echoed back.
    Verbatim,
}

/// Behaviour of the accept loop when `accept` itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AcceptPolicy {
    /// Stop the server and exit with an error.
    #[default]
    Fatal,
    /// Log the failure and keep accepting.
    Continue,
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
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub protocol: ProtocolType,
    #[serde(default)]
    pub accept_errors: AcceptPolicy,
    /// Number of worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            protocol: ProtocolType::default(),
            accept_errors: AcceptPolicy::default(),
            workers: None,
        }
    }
}

/// Per-connection configuration
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Read deadline in seconds, 0 disables it
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// Maximum line length in bytes, 0 disables the check
    #[serde(default)]
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: default_read_timeout(),
            max_line_length: 0,
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

fn default_listen() -> String {
    ":8000".to_string()
}

fn default_read_timeout() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address, already normalized for `TcpListener::bind`.
    pub listen: String,
    pub protocol: ProtocolType,
    pub accept_errors: AcceptPolicy,
    pub connection: ConnectionOptions,
    pub workers: Option<usize>,
    pub log_level: String,
}

/// Limits applied to every accepted connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub read_timeout: Option<Duration>,
    pub max_line_length: Option<usize>,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let read_timeout = cli
            .read_timeout
            .unwrap_or(toml_config.connection.read_timeout);
        let max_line_length = cli
            .max_line_length
            .unwrap_or(toml_config.connection.max_line_length);

        Config {
            listen: normalize_listen(cli.listen.as_deref().unwrap_or(&toml_config.server.listen)),
            protocol: cli.protocol.unwrap_or(toml_config.server.protocol),
            accept_errors: cli.accept_errors.unwrap_or(toml_config.server.accept_errors),
            connection: ConnectionOptions {
                read_timeout: (read_timeout > 0).then(|| Duration::from_secs(read_timeout)),
                max_line_length: (max_line_length > 0).then_some(max_line_length),
            },
            workers: cli.workers.or(toml_config.server.workers),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }
}

/// Expand the `:port` shorthand to every IPv4 interface.
pub fn normalize_listen(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {err}", path = .0.display(), err = .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{path}': {err}", path = .0.display(), err = .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
