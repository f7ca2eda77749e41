//! Intent sequencing and a simple automated driver
//!
//! Every intent carries a sequence number from one per-client counter so
//! the authority can order them and drop stale ones. Movement is resent
//! when it changes or after a keep-alive interval, which also keeps the
//! connection from timing out.

use rand::Rng;
use shared::{Packet, Vec3};
use std::time::{Duration, Instant};

pub struct IntentSequencer {
    next_sequence: u32,
    direction: Vec3,
    last_move_sent: Option<Instant>,
    keepalive: Duration,
}

impl IntentSequencer {
    pub fn new() -> Self {
        Self::with_keepalive(Duration::from_millis(250))
    }

    pub fn with_keepalive(keepalive: Duration) -> Self {
        Self {
            next_sequence: 1,
            direction: Vec3::ZERO,
            last_move_sent: None,
            keepalive,
        }
    }

    fn next(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1).max(1);
        sequence
    }

    /// Returns a move packet if the direction changed or the keep-alive is due
    pub fn update_move(&mut self, direction: Vec3) -> Option<Packet> {
        let changed = direction != self.direction;
        let due = self
            .last_move_sent
            .map_or(true, |sent| sent.elapsed() >= self.keepalive);
        if !changed && !due {
            return None;
        }

        self.direction = direction;
        self.last_move_sent = Some(Instant::now());
        Some(Packet::Move {
            sequence: self.next(),
            direction,
        })
    }

    pub fn aim(&mut self, point: Vec3) -> Packet {
        Packet::Aim {
            sequence: self.next(),
            point,
        }
    }

    pub fn shoot(&mut self, target: Vec3) -> Packet {
        Packet::Shoot {
            sequence: self.next(),
            target,
        }
    }

    pub fn current_direction(&self) -> Vec3 {
        self.direction
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }
}

impl Default for IntentSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks a new random ground direction every `change_every`
pub struct Wanderer {
    direction: Vec3,
    changed_at: Option<Instant>,
    change_every: Duration,
}

impl Wanderer {
    pub fn new(change_every: Duration) -> Self {
        Self {
            direction: Vec3::ZERO,
            changed_at: None,
            change_every,
        }
    }

    pub fn direction(&mut self, rng: &mut impl Rng) -> Vec3 {
        let due = self
            .changed_at
            .map_or(true, |at| at.elapsed() >= self.change_every);
        if due {
            let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
            self.direction = Vec3::new(angle.cos(), 0.0, angle.sin());
            self.changed_at = Some(Instant::now());
        }
        self.direction
    }
}
