//! Game State
//!
//! One session's board, turn owner, shape assignment and reset handshake.
//!
//! This type is transport-agnostic: it never sends anything. Callers feed it
//! player actions and turn the returned outcomes into wire messages. All
//! randomness comes from the caller-supplied RNG so tests can seed it.

use std::fmt;

use rand::Rng;

use crate::game::board::{Board, Shape, WinType};

// =============================================================================
// PLAYER
// =============================================================================

/// Seat within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Player {
    /// First connection paired from the queue.
    One,
    /// Second connection paired from the queue.
    Two,
}

impl Player {
    /// Both seats, in order.
    pub const BOTH: [Player; 2] = [Player::One, Player::Two];

    /// The opponent's seat.
    #[inline]
    pub fn other(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Array index for per-player storage.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Player::One => 0,
            Player::Two => 1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::One => write!(f, "Player 1"),
            Player::Two => write!(f, "Player 2"),
        }
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Coarse session phase, derived from the turn owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// A player holds the turn.
    AwaitingMoves,
    /// Board is won or full; only a reset leaves this phase.
    Terminal,
}

/// An accepted move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Cell that was written.
    pub cell: usize,
    /// Shape of the mover.
    pub shape: Shape,
    /// Board evaluation after the move.
    pub win_type: WinType,
    /// Turn owner after the move (`None` once terminal).
    pub next_turn: Option<Player>,
}

/// Result of a reset request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Only one side has asked; the other should be told.
    Pending {
        /// Player to notify that a rematch was requested.
        notify: Player,
    },
    /// Both sides asked; the board, shapes and turn were re-rolled.
    Reset,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// State of one two-player game.
#[derive(Clone, Debug)]
pub struct GameState {
    board: Board,
    turn: Option<Player>,
    shapes: [Shape; 2],
    reset_requests: [bool; 2],
}

impl GameState {
    /// Create a game with a random first player and shape assignment.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut state = Self {
            board: Board::new(),
            turn: None,
            shapes: [Shape::X, Shape::O],
            reset_requests: [false; 2],
        };
        state.reset(rng);
        state
    }

    /// Clear the board, re-roll shapes and turn, forget reset requests.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let first_shape = if rng.gen_bool(0.5) { Shape::X } else { Shape::O };
        self.shapes = [first_shape, first_shape.opposite()];
        self.turn = Some(if rng.gen_bool(0.5) { Player::One } else { Player::Two });
        self.board.clear();
        self.reset_requests = [false; 2];
    }

    /// Apply a move for `player`.
    ///
    /// Returns `None` without touching anything when the game is terminal,
    /// it is not `player`'s turn, or the cell is occupied or off the board.
    pub fn apply_move(&mut self, player: Player, cell: usize) -> Option<MoveOutcome> {
        if self.turn != Some(player) {
            return None;
        }

        let shape = self.shape_of(player);
        if !self.board.place(cell, shape) {
            return None;
        }

        let win_type = self.board.win_type();
        self.turn = if win_type.is_terminal() {
            None
        } else {
            Some(player.other())
        };

        Some(MoveOutcome {
            cell,
            shape,
            win_type,
            next_turn: self.turn,
        })
    }

    /// Record a reset request from `player`, resetting once both agree.
    pub fn request_reset<R: Rng + ?Sized>(&mut self, player: Player, rng: &mut R) -> ResetOutcome {
        self.reset_requests[player.index()] = true;

        if self.reset_requests.iter().all(|requested| *requested) {
            self.reset(rng);
            ResetOutcome::Reset
        } else {
            ResetOutcome::Pending {
                notify: player.other(),
            }
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.turn {
            Some(_) => Phase::AwaitingMoves,
            None => Phase::Terminal,
        }
    }

    /// Player allowed to move, `None` when terminal.
    pub fn turn(&self) -> Option<Player> {
        self.turn
    }

    /// Whether `player` holds the turn.
    pub fn is_turn_of(&self, player: Player) -> bool {
        self.turn == Some(player)
    }

    /// Shape assigned to `player`.
    pub fn shape_of(&self, player: Player) -> Shape {
        self.shapes[player.index()]
    }

    /// Whether `player` has asked for a reset in the current cycle.
    pub fn reset_requested(&self, player: Player) -> bool {
        self.reset_requests[player.index()]
    }

    /// The board.
    pub fn board(&self) -> &Board {
        &self.board
    }
}
