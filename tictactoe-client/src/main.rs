//! Tic-Tac-Toe terminal client
//!
//! Type a cell number (0-8) to move, `/again` for a rematch once a round
//! is over, `/quit` to leave. Anything else goes to the opponent as chat.

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tictactoe_client::network::{ClientPhase, ClientState, GameClient};
use tictactoe_client::ui::{self, Command};
use tictactoe_client::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::parse();

    // Logs go to stderr so they don't interleave with the board
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log level {:?}", config.log_level))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let (client, mut incoming) = GameClient::connect(&config)
        .await
        .with_context(|| format!("Failed to connect to {}", config.server_addr()))?;
    info!("Connected to {}", config.server_addr());

    let mut state = ClientState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            message = incoming.recv() => {
                let Some(message) = message else {
                    println!("Disconnected from server.");
                    break;
                };
                let mut redraw = false;
                for event in state.apply(&message) {
                    debug!("Event: {:?}", event);
                    redraw |= ui::redraws_board(&event);
                    if let Some(text) = ui::describe(&event) {
                        println!("{}", text);
                    }
                }
                if redraw {
                    print!("{}", ui::render_board(&state.board));
                }
                println!("{}", ui::status_line(&state));
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match ui::parse_command(&line) {
                    Command::Move(cell) => match state.request_move(cell) {
                        Some(request) => client.send(request).await?,
                        None => println!("Cell {} is not playable right now.", cell),
                    },
                    Command::Rematch => match state.request_rematch() {
                        Some(request) => client.send(request).await?,
                        None => println!("Rematch is only available once a round is over."),
                    },
                    Command::Chat(text) => {
                        if matches!(state.phase, ClientPhase::Playing | ClientPhase::GameOver) {
                            client.chat(text).await?;
                        } else {
                            println!("No opponent yet.");
                        }
                    }
                    Command::Redraw => {
                        print!("{}", ui::render_board(&state.board));
                        println!("{}", ui::status_line(&state));
                    }
                    Command::Quit => break,
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    client.close().await;
    Ok(())
}
