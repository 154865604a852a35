//! Game Logic Module
//!
//! Transport-agnostic tic-tac-toe rules.
//!
//! ## Module Structure
//!
//! - `board`: Cells, shapes, canonical win lines and win-type codes
//! - `state`: Turn ownership, move validation and the reset handshake

pub mod board;
pub mod state;

// Re-export key types
pub use board::{Board, Shape, WinType, CELL_COUNT, WIN_LINES};
pub use state::{GameState, MoveOutcome, Phase, Player, ResetOutcome};
