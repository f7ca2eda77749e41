//! Authority-side event topic
//!
//! Combat publishes, the session routes to scoring and respawn.

use shared::{ClientId, EntityId, EventBus};

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    PlayerSpawned { client_id: ClientId, entity_id: EntityId },
    PlayerRespawned { client_id: ClientId },
    PlayerDied { victim: ClientId },
    PlayerKilled { killer: ClientId },
    PlayerDisconnected { client_id: ClientId },
}

pub fn server_bus() -> EventBus<ServerEvent> {
    EventBus::new("server")
}
