//! Game Session Management
//!
//! A [`GameSession`] binds two paired peers to one [`GameState`]. Every
//! `handle_*` call holds the session lock for its whole duration, including
//! queuing the outgoing frames, so two workers can never interleave a turn
//! check with a move.
//!
//! Outgoing frames go through each peer's bounded channel with `try_send`;
//! the lock is never held across a network write.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::game::state::{GameState, Player, ResetOutcome};
use crate::network::admission::AdmissionSlot;
use crate::network::protocol::{Message, OPPONENT_DISCONNECTED};

/// Unique session identifier (8 lowercase hex characters).
pub type SessionId = String;

/// Generate a session id from a random UUID.
pub fn new_session_id() -> SessionId {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Mutable state guarded by the session lock.
struct SessionInner {
    game: GameState,
    rng: StdRng,
    peers: [Option<mpsc::Sender<Message>>; 2],
    slot: Option<AdmissionSlot>,
    closed: bool,
}

/// One live game between two peers.
pub struct GameSession {
    id: SessionId,
    inner: Mutex<SessionInner>,
    close_tx: watch::Sender<bool>,
}

impl GameSession {
    /// Create a session with an OS-seeded RNG.
    pub fn new(id: SessionId, peers: [mpsc::Sender<Message>; 2], slot: AdmissionSlot) -> Self {
        Self::with_rng(id, peers, slot, StdRng::from_entropy())
    }

    /// Create a session with a caller-supplied RNG.
    pub fn with_rng(
        id: SessionId,
        peers: [mpsc::Sender<Message>; 2],
        slot: AdmissionSlot,
        mut rng: StdRng,
    ) -> Self {
        let game = GameState::new(&mut rng);
        let [first, second] = peers;
        let (close_tx, _) = watch::channel(false);

        Self {
            id,
            inner: Mutex::new(SessionInner {
                game,
                rng,
                peers: [Some(first), Some(second)],
                slot: Some(slot),
                closed: false,
            }),
            close_tx,
        }
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receiver that flips to `true` once the session is torn down.
    pub fn subscribe_close(&self) -> watch::Receiver<bool> {
        self.close_tx.subscribe()
    }

    /// Tell both peers their seat and the opening shape/turn.
    pub async fn start(&self) {
        let inner = self.inner.lock().await;
        if inner.closed {
            return;
        }

        for player in Player::BOTH {
            self.send_to(&inner, player, Message::start(player, &self.id));
        }
        self.send_reset_confirmations(&inner);

        info!(
            sid = %self.id,
            "Session started, {} moves first",
            inner.game.turn().map(|p| p.to_string()).unwrap_or_default()
        );
    }

    /// Apply a move from `player`. Invalid moves are silently dropped.
    pub async fn handle_move(&self, player: Player, cell: usize) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }

        let Some(outcome) = inner.game.apply_move(player, cell) else {
            debug!(sid = %self.id, "Ignoring move to {} from {}", cell, player);
            return;
        };

        let code = outcome.win_type.code();
        for recipient in Player::BOTH {
            let message = Message::move_update(
                outcome.cell,
                outcome.shape,
                outcome.next_turn,
                code,
                outcome.next_turn == Some(recipient),
            );
            self.send_to(&inner, recipient, message);
        }

        if outcome.win_type.is_terminal() {
            info!(sid = %self.id, "Game over (win type {})", code);
        }
    }

    /// Record a rematch request from `player`.
    pub async fn handle_reset_request(&self, player: Player) {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return;
        }

        let inner = &mut *guard;
        let repeated = inner.game.reset_requested(player);
        match inner.game.request_reset(player, &mut inner.rng) {
            ResetOutcome::Pending { notify } => {
                if repeated {
                    debug!(sid = %self.id, "{} repeated its reset request", player);
                } else {
                    debug!(sid = %self.id, "{} requested a reset", player);
                }
                self.send_to(inner, notify, Message::play_again());
            }
            ResetOutcome::Reset => {
                info!(sid = %self.id, "Board reset");
                self.send_reset_confirmations(inner);
            }
        }
    }

    /// Relay a chat line to the other player. Never echoed to the sender.
    pub async fn handle_chat(&self, player: Player, text: String) {
        let inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        self.send_to(&inner, player.other(), Message::chat(text));
    }

    /// Tear the session down after `player` went away.
    ///
    /// Only the first call does anything; it returns `true`.
    pub async fn handle_disconnect(&self, player: Player) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return false;
        }

        info!(sid = %self.id, "{} disconnected", player);
        self.send_to(&inner, player.other(), Message::notice(OPPONENT_DISCONNECTED));
        self.close(&mut inner);
        true
    }

    /// Tear the session down, telling both players why.
    pub async fn shutdown(&self, reason: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return false;
        }

        for player in Player::BOTH {
            self.send_to(&inner, player, Message::notice(reason));
        }
        self.close(&mut inner);
        true
    }

    /// Whether the session was torn down.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    /// Snapshot of the game.
    pub async fn game_state(&self) -> GameState {
        self.inner.lock().await.game.clone()
    }

    /// Mark closed, drop both outgoing channels, release the slot and wake
    /// the workers. Caller holds the lock.
    fn close(&self, inner: &mut SessionInner) {
        inner.closed = true;
        // Writers drain what is queued, then shut their streams down.
        inner.peers = [None, None];
        if let Some(slot) = inner.slot.take() {
            slot.release();
        }
        self.close_tx.send_replace(true);
        info!(sid = %self.id, "Session closed");
    }

    fn send_reset_confirmations(&self, inner: &SessionInner) {
        for player in Player::BOTH {
            let message = Message::reset_confirmation(
                inner.game.shape_of(player),
                inner.game.is_turn_of(player),
            );
            self.send_to(inner, player, message);
        }
    }

    /// Queue a frame for one peer without blocking.
    fn send_to(&self, inner: &SessionInner, player: Player, message: Message) {
        let Some(tx) = &inner.peers[player.index()] else {
            return;
        };
        match tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(sid = %self.id, "Outgoing queue full for {}, dropping {:?}", player, message.kind);
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!(sid = %self.id, "Writer for {} gone, dropping {:?}", player, message.kind);
            }
        }
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Registry of live sessions.
pub struct SessionManager {
    /// Active sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<GameSession>>>,
}

impl SessionManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Pick an id no live session uses.
    pub async fn allocate_id(&self) -> SessionId {
        let sessions = self.sessions.read().await;
        loop {
            let id = new_session_id();
            if !sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Add a session.
    pub async fn register(&self, session: Arc<GameSession>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
    }

    /// Remove a session.
    pub async fn remove_session(&self, id: &str) -> Option<Arc<GameSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Shut every session down with `reason`. Returns how many were closed.
    pub async fn close_all(&self, reason: &str) -> usize {
        let drained: Vec<Arc<GameSession>> = {
            let mut sessions = self.sessions.write().await;
            std::mem::take(&mut *sessions).into_values().collect()
        };

        let mut closed = 0;
        for session in drained {
            if session.shutdown(reason).await {
                closed += 1;
            }
        }
        closed
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
