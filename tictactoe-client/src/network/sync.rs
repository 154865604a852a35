//! Client-side mirror of the game, driven by server messages
//!
//! The server is authoritative. This module only applies what the server
//! says and turns it into events a front end can render.

use tictactoe::game::board::{Board, Shape, WinType};
use tictactoe::game::state::Player;
use tictactoe::network::protocol::{Message, MessageType, VERSION_VALID};

/// Where the client is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Version check sent, no verdict yet.
    Connecting,
    /// Accepted and waiting for an opponent.
    Searching,
    /// In a session, round in progress.
    Playing,
    /// In a session, round finished.
    GameOver,
    /// Server refused our version.
    Rejected,
}

/// How a round ended, from our point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won { line: [usize; 3] },
    Lost { line: [usize; 3] },
    Draw,
}

/// Something the front end should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Version accepted; waiting for a match.
    Searching,
    /// Version refused; the server will hang up.
    VersionRejected,
    /// Paired into a session.
    Joined { player: Player, session_id: String },
    /// Fresh board with our (possibly new) shape.
    NewRound { shape: Shape, my_turn: bool },
    /// A shape was placed.
    MovePlayed { cell: usize, shape: Shape, my_turn: bool },
    GameOver(Outcome),
    OpponentWantsRematch,
    Chat(String),
    /// Server notice, e.g. opponent disconnected.
    Notice(String),
    /// Message that means nothing in the current phase.
    Ignored(MessageType),
}

/// Local view of the session.
#[derive(Debug, Clone)]
pub struct ClientState {
    pub phase: ClientPhase,
    pub player: Option<Player>,
    pub session_id: Option<String>,
    pub shape: Option<Shape>,
    pub my_turn: bool,
    pub board: Board,
    pub outcome: Option<Outcome>,
    pub rematch_requested: bool,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            phase: ClientPhase::Connecting,
            player: None,
            session_id: None,
            shape: None,
            my_turn: false,
            board: Board::new(),
            outcome: None,
            rematch_requested: false,
        }
    }

    /// Apply one server message and report what changed.
    pub fn apply(&mut self, message: &Message) -> Vec<ClientEvent> {
        match message.kind {
            MessageType::VersionCheck => self.on_version_check(message),
            MessageType::Start => self.on_start(message),
            MessageType::ResetConfirmation => self.on_reset(message),
            MessageType::Move => self.on_move(message),
            MessageType::PlayAgain => vec![ClientEvent::OpponentWantsRematch],
            MessageType::Chat => vec![ClientEvent::Chat(message.content_str().to_string())],
            MessageType::Notice => vec![ClientEvent::Notice(message.content_str().to_string())],
            other => vec![ClientEvent::Ignored(other)],
        }
    }

    /// Whether a move to `cell` is worth sending.
    pub fn can_move(&self, cell: usize) -> bool {
        self.phase == ClientPhase::Playing && self.my_turn && self.board.is_free(cell)
    }

    /// Move request for `cell`, if it is ours to make.
    pub fn request_move(&self, cell: usize) -> Option<Message> {
        self.can_move(cell).then(|| Message::move_request(cell))
    }

    /// Rematch request, once the round is over and we have not asked yet.
    pub fn request_rematch(&mut self) -> Option<Message> {
        if self.phase != ClientPhase::GameOver || self.rematch_requested {
            return None;
        }
        self.rematch_requested = true;
        Some(Message::reset_request())
    }

    fn on_version_check(&mut self, message: &Message) -> Vec<ClientEvent> {
        if self.phase != ClientPhase::Connecting {
            return vec![ClientEvent::Ignored(MessageType::VersionCheck)];
        }
        if message.content.as_deref() == Some(VERSION_VALID) {
            self.phase = ClientPhase::Searching;
            vec![ClientEvent::Searching]
        } else {
            self.phase = ClientPhase::Rejected;
            vec![ClientEvent::VersionRejected]
        }
    }

    fn on_start(&mut self, message: &Message) -> Vec<ClientEvent> {
        let Some(player) = message.player.and_then(|p| p.seat()) else {
            return vec![ClientEvent::Ignored(MessageType::Start)];
        };
        let session_id = message.content_str().to_string();
        self.player = Some(player);
        self.session_id = Some(session_id.clone());
        vec![ClientEvent::Joined { player, session_id }]
    }

    fn on_reset(&mut self, message: &Message) -> Vec<ClientEvent> {
        let Some(shape) = message.player_shape else {
            return vec![ClientEvent::Ignored(MessageType::ResetConfirmation)];
        };
        let my_turn = message.is_your_turn.unwrap_or(false);

        self.phase = ClientPhase::Playing;
        self.shape = Some(shape);
        self.my_turn = my_turn;
        self.board.clear();
        self.outcome = None;
        self.rematch_requested = false;

        vec![ClientEvent::NewRound { shape, my_turn }]
    }

    fn on_move(&mut self, message: &Message) -> Vec<ClientEvent> {
        let (Some(cell), Some(shape)) = (message.cell_index(), message.player_shape) else {
            return vec![ClientEvent::Ignored(MessageType::Move)];
        };
        if self.phase != ClientPhase::Playing {
            return vec![ClientEvent::Ignored(MessageType::Move)];
        }

        self.board.place(cell, shape);
        self.my_turn = message.is_your_turn.unwrap_or(false);

        let mut events = vec![ClientEvent::MovePlayed {
            cell,
            shape,
            my_turn: self.my_turn,
        }];

        let win_type = message
            .win_type
            .and_then(WinType::from_code)
            .unwrap_or(WinType::Ongoing);

        let outcome = match win_type {
            WinType::Ongoing => None,
            WinType::Draw => Some(Outcome::Draw),
            WinType::Line(_) => win_type.line().map(|line| {
                if Some(shape) == self.shape {
                    Outcome::Won { line }
                } else {
                    Outcome::Lost { line }
                }
            }),
        };

        if let Some(outcome) = outcome {
            self.phase = ClientPhase::GameOver;
            self.my_turn = false;
            self.outcome = Some(outcome);
            events.push(ClientEvent::GameOver(outcome));
        }
        events
    }
}
