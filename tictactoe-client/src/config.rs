//! Client configuration: command-line flags with `TICTACTOE_*` env fallbacks

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use tictactoe::config::{DEFAULT_PORT, DEFAULT_VERSION};

/// Where and how to connect.
#[derive(Parser, Debug, Clone)]
#[command(name = "tictactoe", version, about = "Terminal client for networked tic-tac-toe")]
pub struct ClientConfig {
    /// Server host name or address.
    #[arg(long, env = "TICTACTOE_HOST", default_value = "localhost")]
    pub host: String,

    /// Server port.
    #[arg(long, env = "TICTACTOE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Name the server certificate must be valid for. Defaults to the host.
    #[arg(long, env = "TICTACTOE_SERVER_NAME")]
    pub server_name: Option<String>,

    /// Protocol version announced in the handshake.
    #[arg(id = "protocol_version", long = "protocol-version", env = "TICTACTOE_VERSION", default_value = DEFAULT_VERSION)]
    pub version: String,

    /// PEM bundle of trusted CAs. Platform roots when unset.
    #[arg(long, env = "TICTACTOE_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Connect without TLS.
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

    /// Log filter for stderr.
    #[arg(long = "log", env = "TICTACTOE_LOG", default_value = "warn")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            server_name: None,
            version: DEFAULT_VERSION.to_string(),
            ca_cert: None,
            plaintext: false,
            log_level: "warn".to_string(),
        }
    }
}

impl ClientConfig {
    /// `host:port` to dial.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Name checked against the server certificate.
    pub fn server_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or(&self.host)
    }
}
