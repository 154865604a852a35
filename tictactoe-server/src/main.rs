//! Tic-Tac-Toe Game Server
//!
//! Listens for players, pairs them and referees their games.
//! Configured through command-line flags or `TICTACTOE_*` environment
//! variables (`--help` lists both).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tictactoe::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log level {:?}", config.log_level))?;
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Tic-Tac-Toe Server v{}", VERSION);
    info!("Protocol version: {}", config.version);
    info!("Max sessions: {}", config.max_sessions);

    let server = Arc::new(GameServer::new(config).context("Failed to create server")?);

    let mut runner = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });

    tokio::select! {
        result = &mut runner => {
            result.context("Server task panicked")?.context("Server failed")?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    runner
        .await
        .context("Server task panicked")?
        .context("Server failed")?;
    info!("Server stopped");
    Ok(())
}
