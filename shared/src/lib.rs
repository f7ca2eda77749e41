use serde::{Deserialize, Serialize};

pub mod events;
pub mod math;

pub use events::{EventBus, Subscription};
pub use math::Vec3;

/// Identifies one connected session
pub type ClientId = u64;

/// Identifies one combat entity instance; never reused within a session
pub type EntityId = u32;

/// Damage source id used by non-player agents
///
/// Never assigned to a connection, never in the roster, never credited.
pub const NON_PLAYER_ID: ClientId = u64::MAX;

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram either side sends or reads
pub const MAX_DATAGRAM: usize = 8192;

// Encoded sizes: variant tag, tick and length prefix; then one player snapshot
const WORLD_STATE_HEADER_BYTES: usize = 4 + 8 + 8;
const ENTITY_SNAPSHOT_BYTES: usize = 4 + 12 + 12 + 12 + 1;

/// Most entities a `WorldState` can carry and still fit in one datagram
pub const MAX_SNAPSHOT_ENTITIES: usize =
    (MAX_DATAGRAM - WORLD_STATE_HEADER_BYTES) / ENTITY_SNAPSHOT_BYTES;
pub const MAX_NICKNAME_BYTES: usize = 32;
pub const HOST_SUFFIX: &str = " (Host)";

/// Which side of the replication boundary a service runs on
///
/// Only the authority may mutate canonical state; every mutating call made
/// with `Role::Observer` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Observer,
}

impl Role {
    pub fn is_authority(self) -> bool {
        matches!(self, Role::Authority)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RosterEntry {
    pub client_id: ClientId,
    pub display_name: String,
    pub is_host: bool,
}

/// One row of the replicated scoreboard
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoreLine {
    pub client_id: ClientId,
    pub nickname: String,
    pub kills: u32,
    pub deaths: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player { owner: ClientId },
    NonPlayer,
}

/// Replicated view of one combat entity
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec3,
    pub aim: Vec3,
    pub alive: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Observer -> authority
    Connect {
        client_version: u32,
        nickname: Vec<u8>,
    },
    Move {
        sequence: u32,
        direction: Vec3,
    },
    Aim {
        sequence: u32,
        point: Vec3,
    },
    Shoot {
        sequence: u32,
        target: Vec3,
    },
    StartMatch,
    Disconnect,

    // Authority -> observer(s)
    Connected {
        client_id: ClientId,
        is_host: bool,
    },
    Rejected {
        reason: String,
    },
    RosterSnapshot {
        entries: Vec<RosterEntry>,
    },
    RosterAppend {
        entry: RosterEntry,
    },
    RosterRemove {
        client_id: ClientId,
    },
    HealthChanged {
        health: f32,
    },
    KillScore {
        kills: u32,
    },
    ScoreboardJoin {
        line: ScoreLine,
    },
    ScoreboardKills {
        client_id: ClientId,
        kills: u32,
    },
    ScoreboardDeaths {
        client_id: ClientId,
        deaths: u32,
    },
    ScoreboardSnapshot {
        lines: Vec<ScoreLine>,
    },
    RespawnNotice {
        position: Vec3,
    },
    MatchStarted,
    WorldState {
        tick: u64,
        entities: Vec<EntitySnapshot>,
    },
    SessionTeardown,
}

impl Packet {
    /// True for packets only an observer may send
    pub fn is_intent(&self) -> bool {
        matches!(
            self,
            Packet::Connect { .. }
                | Packet::Move { .. }
                | Packet::Aim { .. }
                | Packet::Shoot { .. }
                | Packet::StartMatch
                | Packet::Disconnect
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_not_a_valid_session_id() {
        assert_eq!(NON_PLAYER_ID, u64::MAX);
        assert!(Role::Authority.is_authority());
        assert!(!Role::Observer.is_authority());
    }

    #[test]
    fn test_intent_classification() {
        assert!(Packet::StartMatch.is_intent());
        assert!(Packet::Shoot {
            sequence: 1,
            target: Vec3::ZERO
        }
        .is_intent());
        assert!(!Packet::SessionTeardown.is_intent());
        assert!(!Packet::RosterRemove { client_id: 3 }.is_intent());
    }

    #[test]
    fn test_packet_serialization_roster_snapshot() {
        let packet = Packet::RosterSnapshot {
            entries: vec![
                RosterEntry {
                    client_id: 1,
                    display_name: "Alice (Host)".to_string(),
                    is_host: true,
                },
                RosterEntry {
                    client_id: 2,
                    display_name: "Bob".to_string(),
                    is_host: false,
                },
            ],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::RosterSnapshot { entries } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].client_id, 1);
                assert!(entries[0].is_host);
                assert_eq!(entries[1].display_name, "Bob");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_world_state() {
        let packet = Packet::WorldState {
            tick: 42,
            entities: vec![EntitySnapshot {
                id: 9,
                kind: EntityKind::Player { owner: 3 },
                position: Vec3::new(1.0, 0.0, -2.0),
                aim: Vec3::FORWARD,
                alive: true,
            }],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::WorldState { tick, entities } => {
                assert_eq!(tick, 42);
                assert_eq!(entities[0].kind, EntityKind::Player { owner: 3 });
                assert_eq!(entities[0].position, Vec3::new(1.0, 0.0, -2.0));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_truncated_packet_is_rejected() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nickname: b"Alice".to_vec(),
        };
        let data = bincode::serialize(&packet).unwrap();
        let result: Result<Packet, _> = bincode::deserialize(&data[..data.len() - 2]);
        assert!(result.is_err());
    }

    fn world_state(count: usize) -> Packet {
        Packet::WorldState {
            tick: u64::MAX,
            entities: (0..count as u32)
                .map(|id| EntitySnapshot {
                    id,
                    kind: EntityKind::Player { owner: id as u64 },
                    position: Vec3::new(1.0, 2.0, 3.0),
                    aim: Vec3::FORWARD,
                    alive: true,
                })
                .collect(),
        }
    }

    #[test]
    fn test_snapshot_entity_budget_fits_datagram() {
        let full = bincode::serialize(&world_state(MAX_SNAPSHOT_ENTITIES)).unwrap();
        assert!(full.len() <= MAX_DATAGRAM);

        let over = bincode::serialize(&world_state(MAX_SNAPSHOT_ENTITIES + 1)).unwrap();
        assert!(over.len() > MAX_DATAGRAM);
    }
}
