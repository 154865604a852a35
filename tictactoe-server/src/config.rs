//! Server Configuration
//!
//! Command-line flags, each with a `TICTACTOE_*` environment fallback and a
//! built-in default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 52423;

/// Default protocol version clients must announce.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Default bound on concurrently active sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Server configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "tictactoe-server", author, version, about)]
pub struct ServerConfig {
    /// Bind address.
    #[arg(
        long,
        env = "TICTACTOE_BIND_ADDR",
        default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
    )]
    pub bind_addr: SocketAddr,

    /// Maximum concurrently active sessions.
    #[arg(long, env = "TICTACTOE_MAX_SESSIONS", default_value_t = DEFAULT_MAX_SESSIONS)]
    pub max_sessions: usize,

    /// Protocol version clients must announce.
    #[arg(id = "protocol_version", long = "protocol-version", env = "TICTACTOE_VERSION", default_value = DEFAULT_VERSION)]
    pub version: String,

    /// PEM certificate chain.
    #[arg(long = "cert", env = "TICTACTOE_CERT", default_value = "combined_cert.pem")]
    pub cert_path: PathBuf,

    /// PEM private key.
    #[arg(long = "key", env = "TICTACTOE_KEY", default_value = "private_key.pem")]
    pub key_path: PathBuf,

    /// Accept unencrypted TCP instead of TLS.
    #[arg(
        long,
        env = "TICTACTOE_PLAINTEXT",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub plaintext: bool,

    /// Fallback interval (ms) for re-checking the queue while it is non-empty.
    #[arg(
        long = "liveness-ms",
        env = "TICTACTOE_LIVENESS_MS",
        default_value = "100",
        value_parser = parse_millis
    )]
    pub liveness_interval: Duration,

    /// Log filter: `info`, `error`, `off` or any tracing directive.
    #[arg(long = "log", env = "TICTACTOE_LOG", default_value = "info")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_sessions: DEFAULT_MAX_SESSIONS,
            version: DEFAULT_VERSION.to_string(),
            cert_path: PathBuf::from("combined_cert.pem"),
            key_path: PathBuf::from("private_key.pem"),
            plaintext: false,
            liveness_interval: Duration::from_millis(100),
            log_level: "info".to_string(),
        }
    }
}

/// Whole milliseconds as a [`Duration`].
fn parse_millis(value: &str) -> Result<Duration, std::num::ParseIntError> {
    value.trim().parse().map(Duration::from_millis)
}
