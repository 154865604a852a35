//! Tic-Tac-Toe terminal client
//!
//! Connects to the game server over TLS, mirrors the board locally and
//! turns typed lines into moves, rematch requests and chat.

pub mod config;
pub mod network;
pub mod ui;

pub use config::ClientConfig;
pub use network::{ClientError, ClientEvent, ClientPhase, ClientState, GameClient, Outcome};
