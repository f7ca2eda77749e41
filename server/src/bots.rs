//! Wave-based non-player spawning
//!
//! The first wave is scheduled when the match starts. Each later wave waits
//! until every agent of the previous wave has been destroyed, then waits the
//! wave delay again. The spawner only decides *when*; the session places the
//! agents and reports their ids back.

use crate::config::BotConfig;
use crate::timers::Tick;
use log::{debug, info};
use shared::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavePhase {
    Idle,
    Scheduled(Tick),
    InAction,
    Finished,
}

#[derive(Debug)]
pub struct BotSpawner {
    bots_per_wave: u32,
    waves_remaining: u32,
    wave_delay: Tick,
    phase: WavePhase,
    spawned: Vec<EntityId>,
    waves_spawned: u32,
}

impl BotSpawner {
    pub fn new(config: &BotConfig, wave_delay: Tick) -> Self {
        Self {
            bots_per_wave: config.bots_per_wave,
            waves_remaining: config.waves,
            wave_delay,
            phase: WavePhase::Idle,
            spawned: Vec::new(),
            waves_spawned: 0,
        }
    }

    pub fn start(&mut self, now: Tick) {
        if self.phase != WavePhase::Idle {
            return;
        }
        if self.bots_per_wave == 0 || self.waves_remaining == 0 {
            self.phase = WavePhase::Finished;
            return;
        }
        self.schedule(now);
    }

    fn schedule(&mut self, now: Tick) {
        let due = now + self.wave_delay;
        debug!("Next bot wave due at tick {}", due);
        self.phase = WavePhase::Scheduled(due);
    }

    /// Advances the wave machine
    ///
    /// `exists` reports whether a spawned agent is still in the world.
    /// Returns the number of agents to spawn when a wave is due.
    pub fn update(&mut self, now: Tick, exists: impl Fn(EntityId) -> bool) -> Option<u32> {
        self.spawned.retain(|id| exists(*id));

        match self.phase {
            WavePhase::InAction if self.spawned.is_empty() => {
                if self.waves_remaining > 0 {
                    info!("Bot wave {} cleared", self.waves_spawned);
                    self.schedule(now);
                } else {
                    info!("All bot waves cleared");
                    self.phase = WavePhase::Finished;
                }
                None
            }
            WavePhase::Scheduled(due) if now >= due => Some(self.bots_per_wave),
            _ => None,
        }
    }

    /// Records the agents the session placed for the due wave
    pub fn wave_spawned(&mut self, ids: Vec<EntityId>) {
        self.waves_remaining = self.waves_remaining.saturating_sub(1);
        self.waves_spawned += 1;
        info!(
            "Spawned bot wave {} with {} agents ({} waves left)",
            self.waves_spawned,
            ids.len(),
            self.waves_remaining
        );
        self.spawned = ids;
        self.phase = WavePhase::InAction;
    }

    pub fn stop(&mut self) {
        self.spawned.clear();
        self.phase = WavePhase::Finished;
    }

    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    pub fn waves_remaining(&self) -> u32 {
        self.waves_remaining
    }

    pub fn active(&self) -> &[EntityId] {
        &self.spawned
    }
}
