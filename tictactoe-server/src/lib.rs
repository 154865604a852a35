//! # Tic-Tac-Toe Game Server
//!
//! Pairs remote players over TLS and referees their games.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TIC-TAC-TOE SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/              - Rules (no I/O)                         │
//! │  ├── board.rs       - Cells, shapes, win lines               │
//! │  └── state.rs       - Turns, moves, reset handshake          │
//! │                                                              │
//! │  network/           - Networking                             │
//! │  ├── protocol.rs    - Length-prefixed JSON frames            │
//! │  ├── tls.rs         - rustls acceptor / plain transport      │
//! │  ├── connection.rs  - Split peer stream + liveness check     │
//! │  ├── handshake.rs   - TLS + version check                    │
//! │  ├── matchmaking.rs - FIFO queue of waiting peers            │
//! │  ├── admission.rs   - Bound on active sessions               │
//! │  ├── session.rs     - One game between two peers             │
//! │  ├── worker.rs      - Per-peer read and write tasks          │
//! │  └── server.rs      - Accept + dispatch loop                 │
//! │                                                              │
//! │  config.rs          - clap flags with env fallbacks          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Guarantee
//!
//! Each session serializes its two players through one lock: a move is
//! validated, applied and queued to both peers before the other player's
//! next frame is looked at. Frames to one peer leave in the order they were
//! queued.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::ServerConfig;
pub use game::board::{Board, Shape, WinType, WIN_LINES};
pub use game::state::{GameState, Player};
pub use network::protocol::{Message, MessageType, PlayerType};
pub use network::server::{GameServer, GameServerError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
