//! Admission Control
//!
//! Bounds the number of concurrently active sessions. The counter is shared
//! by every task; the dispatch loop is the only caller of [`AdmissionController::admit`],
//! so checking capacity and admitting never race with each other.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Gate on active sessions.
#[derive(Debug)]
pub struct AdmissionController {
    max_sessions: usize,
    active: AtomicUsize,
    released: Notify,
}

impl AdmissionController {
    /// Create a controller admitting at most `max_sessions` sessions.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            active: AtomicUsize::new(0),
            released: Notify::new(),
        }
    }

    /// Whether another session may start. Does not reserve anything.
    pub fn try_acquire(&self) -> bool {
        self.active.load(Ordering::Acquire) < self.max_sessions
    }

    /// Count a new session and hand out its slot.
    pub fn admit(self: &Arc<Self>) -> AdmissionSlot {
        self.active.fetch_add(1, Ordering::AcqRel);
        AdmissionSlot {
            controller: Arc::clone(self),
            released: AtomicBool::new(false),
        }
    }

    /// Active session count.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Configured maximum.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Wait until a slot is released.
    ///
    /// A release that happens while nobody waits is remembered, so the next
    /// call returns immediately.
    pub async fn released(&self) {
        self.released.notified().await;
    }

    fn release_one(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.released.notify_one();
    }
}

/// One admitted session's claim on the controller.
///
/// Released at most once, explicitly or on drop.
#[derive(Debug)]
pub struct AdmissionSlot {
    controller: Arc<AdmissionController>,
    released: AtomicBool,
}

impl AdmissionSlot {
    /// Give the slot back. Returns false if it was already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.controller.release_one();
        true
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.release();
    }
}
