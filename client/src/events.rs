//! Observer-side event topic
//!
//! The observer state republishes what it learns from the authority so the
//! rest of the client (logging, a HUD, a renderer) can react without
//! polling.

use shared::{ClientId, EventBus, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { client_id: ClientId, is_host: bool },
    Disconnected { reason: String },
    HealthChanged { health: f32 },
    KillScoreChanged { kills: u32 },
    RosterChanged { size: usize },
    ScoreboardChanged,
    Respawned { position: Vec3 },
    MatchStarted,
    WorldUpdated { tick: u64 },
    SessionEnded,
}

pub fn client_bus() -> EventBus<ClientEvent> {
    EventBus::new("client")
}
