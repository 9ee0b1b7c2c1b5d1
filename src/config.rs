//! Configuration for the echo server and benchmark client.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values. The resolved
//! `Config` is built once at startup and passed by reference into the
//! server and coordinator; there are no process-wide settings.

use clap::{CommandFactory, Parser, Subcommand};
use serde::Deserialize;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the benchmark binary.
#[derive(Parser, Debug)]
#[command(name = "echo-bench")]
#[command(version = "0.1.0")]
#[command(about = "A TCP echo round-trip benchmark", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the event-driven echo server
    Server {
        /// Address to bind
        host: Option<String>,
        /// Port to listen on
        port: Option<u16>,
    },
    /// Run the multi-threaded benchmark client
    Client {
        /// Server address to connect to
        host: Option<String>,
        /// Server port
        port: Option<u16>,
        /// Number of worker threads, one connection each
        workers: Option<usize>,
        /// Requests sent per worker
        requests: Option<u64>,
        /// Cap on each readiness wait, in milliseconds (waits forever
        /// when absent)
        #[arg(long)]
        wait_timeout_ms: Option<u64>,
    },
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub bench: BenchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server endpoint shared by both modes
#[derive(Debug, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Benchmark-side configuration
#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Requests sent per worker
    #[serde(default = "default_requests")]
    pub requests: u64,
    /// Readiness wait cap in milliseconds; absent = wait forever
    pub wait_timeout_ms: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            requests: default_requests(),
            wait_timeout_ms: None,
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_workers() -> usize {
    4
}

fn default_requests() -> u64 {
    1_000_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which half of the benchmark this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Client,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Option<Mode>,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub requests: u64,
    pub wait_timeout: Option<Duration>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let mut config = Config {
            mode: None,
            host: toml_config.endpoint.host,
            port: toml_config.endpoint.port,
            workers: toml_config.bench.workers,
            requests: toml_config.bench.requests,
            wait_timeout: toml_config.bench.wait_timeout_ms.map(Duration::from_millis),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        match cli.command {
            Some(Command::Server { host, port }) => {
                config.mode = Some(Mode::Server);
                if let Some(host) = host {
                    config.host = host;
                }
                if let Some(port) = port {
                    config.port = port;
                }
            }
            Some(Command::Client {
                host,
                port,
                workers,
                requests,
                wait_timeout_ms,
            }) => {
                config.mode = Some(Mode::Client);
                if let Some(host) = host {
                    config.host = host;
                }
                if let Some(port) = port {
                    config.port = port;
                }
                if let Some(workers) = workers {
                    config.workers = workers;
                }
                if let Some(requests) = requests {
                    config.requests = requests;
                }
                if let Some(ms) = wait_timeout_ms {
                    config.wait_timeout = Some(Duration::from_millis(ms));
                }
            }
            None => {}
        }

        Ok(config)
    }

    /// Resolve the configured endpoint to a socket address.
    pub fn socket_addr(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "endpoint did not resolve to any address",
                )
            })
    }
}

/// Print top-level usage. Used when no mode is given.
pub fn print_usage() {
    let _ = CliArgs::command().print_help();
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
