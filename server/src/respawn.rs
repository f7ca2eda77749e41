//! Queued, delayed player respawns
//!
//! Dead players wait in a FIFO queue. Each tick at most one request leaves
//! the queue and starts its own countdown, so respawns staggered by death
//! order also fire in death order. A disconnect cancels both the queued
//! request and any running countdown for that client.

use crate::timers::{Tick, Timers};
use log::{debug, warn};
use shared::{ClientId, Role, NON_PLAYER_ID};
use std::collections::VecDeque;

/// A dead (or late-joining) client waiting for a fresh entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespawnRequest {
    pub client_id: ClientId,
    pub enqueued_at: Tick,
}

/// FIFO respawn queue feeding per-request countdowns
///
/// Requests move through two stages: waiting in `queue`, then counting down
/// in `pending` once [`RespawnScheduler::drain`] pops them. Both stages keep
/// death order.
pub struct RespawnScheduler {
    role: Role,
    delay: Tick,
    queue: VecDeque<RespawnRequest>,
    pending: Timers<RespawnRequest>,
}

impl RespawnScheduler {
    /// Creates an empty scheduler whose countdowns last `delay` ticks
    pub fn new(role: Role, delay: Tick) -> Self {
        Self {
            role,
            delay,
            queue: VecDeque::new(),
            pending: Timers::new(),
        }
    }

    /// Queues a respawn for `client_id`; duplicates and the sentinel are refused
    ///
    /// A client already queued or counting down is not queued again, so a
    /// repeated death event cannot give it two entities.
    pub fn enqueue(&mut self, client_id: ClientId, now: Tick) -> bool {
        if !self.role.is_authority() {
            return false;
        }
        if client_id == NON_PLAYER_ID {
            warn!("Refusing respawn request for the non-player id");
            return false;
        }
        if self.is_waiting(client_id) {
            debug!("Client {} already waiting to respawn", client_id);
            return false;
        }

        self.queue.push_back(RespawnRequest {
            client_id,
            enqueued_at: now,
        });
        debug!("Queued respawn for {} ({} waiting)", client_id, self.queue.len());
        true
    }

    /// Starts the countdown for the oldest queued request, if any
    ///
    /// Pops at most one request per call. The countdown runs on its own
    /// from here, so the next request can be popped on the very next call.
    pub fn drain(&mut self, now: Tick) -> Option<ClientId> {
        if !self.role.is_authority() {
            return None;
        }
        let request = self.queue.pop_front()?;
        self.pending.schedule(now + self.delay, request);
        debug!(
            "Respawn for {} due at tick {}",
            request.client_id,
            now + self.delay
        );
        Some(request.client_id)
    }

    /// Requests whose countdown has finished, oldest first
    pub fn fire_due(&mut self, now: Tick) -> Vec<RespawnRequest> {
        self.pending.pop_due(now)
    }

    /// Forgets every queued and running respawn for a client
    ///
    /// Returns how many requests were dropped. Other clients keep their
    /// place in line.
    pub fn cancel(&mut self, client_id: ClientId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|r| r.client_id != client_id);
        let dequeued = before - self.queue.len();
        let stopped = self.pending.cancel_where(|r| r.client_id == client_id);
        if dequeued + stopped > 0 {
            debug!("Cancelled respawn for {}", client_id);
        }
        dequeued + stopped
    }

    /// True while the client is queued or counting down
    pub fn is_waiting(&self, client_id: ClientId) -> bool {
        self.queue.iter().any(|r| r.client_id == client_id)
            || self.pending.iter().any(|r| r.client_id == client_id)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }

    /// Requests not yet popped by [`RespawnScheduler::drain`]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Requests whose countdown is running
    pub fn counting_down(&self) -> usize {
        self.pending.len()
    }
}
