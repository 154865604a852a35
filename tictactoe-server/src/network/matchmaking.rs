//! Matchmaking Queue
//!
//! FIFO holding area for validated connections waiting for an opponent.
//! Entries leave the queue exactly once, either paired or pruned.

use std::collections::VecDeque;
use std::fmt::Debug;

use tracing::debug;

use crate::network::connection::{Liveness, PeerConnection, LivenessCheck};

/// FIFO queue of waiting peers.
#[derive(Debug)]
pub struct MatchmakingQueue<C = PeerConnection> {
    waiting: VecDeque<C>,
}

impl<C> Default for MatchmakingQueue<C> {
    fn default() -> Self {
        Self {
            waiting: VecDeque::new(),
        }
    }
}

impl<C> MatchmakingQueue<C> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a peer at the back.
    pub fn enqueue(&mut self, conn: C) {
        self.waiting.push_back(conn);
    }

    /// Pop the two oldest peers, if at least two are waiting.
    pub fn try_pair(&mut self) -> Option<(C, C)> {
        if self.waiting.len() < 2 {
            return None;
        }
        let first = self.waiting.pop_front()?;
        let second = self.waiting.pop_front()?;
        Some((first, second))
    }

    /// Number of waiting peers.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Whether nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Remove every waiting peer, oldest first.
    pub fn drain(&mut self) -> Vec<C> {
        self.waiting.drain(..).collect()
    }
}

impl<C: LivenessCheck + Debug> MatchmakingQueue<C> {
    /// Drop every peer whose liveness check reports it closed. Returns how many went.
    ///
    /// Dropping a peer closes its stream.
    pub fn prune_dead(&mut self) -> usize {
        let before = self.waiting.len();
        self.waiting.retain_mut(|conn| match conn.check_liveness() {
            Liveness::Alive => true,
            Liveness::Closed => {
                debug!("Pruning closed connection {:?}", conn);
                false
            }
        });
        before - self.waiting.len()
    }
}
