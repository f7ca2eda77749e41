//! Read-only projection of the authority's session
//!
//! [`ObserverState`] applies every authority message idempotently. Late,
//! duplicated and reordered datagrams are tolerated: roster and scoreboard
//! merges only add what is missing or raise counters, and world snapshots
//! older than the newest one seen are dropped.

use crate::events::{client_bus, ClientEvent};
use crate::roster::ObserverRoster;
use log::{debug, info, warn};
use shared::{ClientId, EntityKind, EntitySnapshot, EventBus, Packet, ScoreLine, Subscription};
use std::collections::BTreeMap;

pub struct ObserverState {
    pub client_id: Option<ClientId>,
    pub is_host: bool,
    pub roster: ObserverRoster,
    pub scoreboard: BTreeMap<ClientId, ScoreLine>,
    /// Owner-only values
    pub health: Option<f32>,
    pub kills: u32,
    pub entities: Vec<EntitySnapshot>,
    pub last_world_tick: Option<u64>,
    pub match_started: bool,
    pub ended: bool,
    bus: EventBus<ClientEvent>,
}

impl ObserverState {
    pub fn new() -> Self {
        Self {
            client_id: None,
            is_host: false,
            roster: ObserverRoster::new(),
            scoreboard: BTreeMap::new(),
            health: None,
            kills: 0,
            entities: Vec::new(),
            last_world_tick: None,
            match_started: false,
            ended: false,
            bus: client_bus(),
        }
    }

    pub fn subscribe(&self) -> Subscription<ClientEvent> {
        self.bus.subscribe()
    }

    /// Applies one authority message; returns false if it changed nothing
    pub fn apply_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Connected { client_id, is_host } => {
                info!("Connected! Client ID: {}{}", client_id, if is_host { " (host)" } else { "" });
                self.client_id = Some(client_id);
                self.is_host = is_host;
                self.ended = false;
                self.bus.publish(ClientEvent::Connected { client_id, is_host });
                true
            }

            Packet::Rejected { reason } => {
                warn!("Connection rejected: {}", reason);
                self.ended = true;
                self.bus.publish(ClientEvent::Disconnected { reason });
                true
            }

            Packet::RosterSnapshot { entries } => {
                let added = self.roster.apply_snapshot(entries);
                self.roster_changed(added > 0)
            }
            Packet::RosterAppend { entry } => {
                let added = self.roster.apply_append(entry);
                self.roster_changed(added)
            }
            Packet::RosterRemove { client_id } => {
                let removed = self.roster.apply_remove(client_id);
                if self.scoreboard.remove(&client_id).is_some() {
                    self.bus.publish(ClientEvent::ScoreboardChanged);
                }
                self.roster_changed(removed)
            }

            Packet::HealthChanged { health } => {
                self.health = Some(health);
                self.bus.publish(ClientEvent::HealthChanged { health });
                true
            }
            Packet::KillScore { kills } => {
                self.kills = kills;
                self.bus.publish(ClientEvent::KillScoreChanged { kills });
                true
            }

            Packet::ScoreboardJoin { line } => {
                let changed = merge_line(&mut self.scoreboard, line);
                self.scoreboard_changed(changed)
            }
            Packet::ScoreboardSnapshot { lines } => {
                let mut changed = false;
                for line in lines {
                    changed |= merge_line(&mut self.scoreboard, line);
                }
                self.scoreboard_changed(changed)
            }
            Packet::ScoreboardKills { client_id, kills } => {
                let changed = match self.scoreboard.get_mut(&client_id) {
                    Some(line) if kills > line.kills => {
                        line.kills = kills;
                        true
                    }
                    Some(_) => false,
                    None => {
                        debug!("Kills for {} before its scoreboard line", client_id);
                        false
                    }
                };
                self.scoreboard_changed(changed)
            }
            Packet::ScoreboardDeaths { client_id, deaths } => {
                let changed = match self.scoreboard.get_mut(&client_id) {
                    Some(line) if deaths > line.deaths => {
                        line.deaths = deaths;
                        true
                    }
                    Some(_) => false,
                    None => {
                        debug!("Deaths for {} before its scoreboard line", client_id);
                        false
                    }
                };
                self.scoreboard_changed(changed)
            }

            Packet::RespawnNotice { position } => {
                info!("Spawned at {:?}", position);
                self.bus.publish(ClientEvent::Respawned { position });
                true
            }

            Packet::MatchStarted => {
                if self.match_started {
                    return false;
                }
                self.match_started = true;
                self.bus.publish(ClientEvent::MatchStarted);
                true
            }

            Packet::WorldState { tick, entities } => {
                if self.last_world_tick.is_some_and(|last| tick <= last) {
                    return false;
                }
                self.last_world_tick = Some(tick);
                self.entities = entities;
                self.bus.publish(ClientEvent::WorldUpdated { tick });
                true
            }

            Packet::SessionTeardown => {
                info!("Session ended by the host");
                self.teardown_local();
                self.ended = true;
                self.bus.publish(ClientEvent::SessionEnded);
                true
            }

            other => {
                warn!("Unexpected packet from server: {:?}", other);
                false
            }
        }
    }

    fn roster_changed(&self, changed: bool) -> bool {
        if changed {
            self.bus.publish(ClientEvent::RosterChanged {
                size: self.roster.len(),
            });
        }
        changed
    }

    fn scoreboard_changed(&self, changed: bool) -> bool {
        if changed {
            self.bus.publish(ClientEvent::ScoreboardChanged);
        }
        changed
    }

    /// Clears everything replicated from the authority
    pub fn teardown_local(&mut self) {
        self.roster.clear();
        self.scoreboard.clear();
        self.entities.clear();
        self.health = None;
        self.kills = 0;
        self.last_world_tick = None;
        self.match_started = false;
    }

    /// This client's newest live entity, if any
    pub fn local_entity(&self) -> Option<&EntitySnapshot> {
        let me = self.client_id?;
        self.entities
            .iter()
            .filter(|e| e.alive && e.kind == EntityKind::Player { owner: me })
            .max_by_key(|e| e.id)
    }

    /// Live entities that are not this client's
    pub fn others(&self) -> impl Iterator<Item = &EntitySnapshot> {
        let me = self.client_id;
        self.entities.iter().filter(move |e| {
            e.alive
                && match e.kind {
                    EntityKind::Player { owner } => Some(owner) != me,
                    EntityKind::NonPlayer => true,
                }
        })
    }
}

impl Default for ObserverState {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_line(scoreboard: &mut BTreeMap<ClientId, ScoreLine>, line: ScoreLine) -> bool {
    match scoreboard.get_mut(&line.client_id) {
        Some(existing) => {
            let kills = existing.kills.max(line.kills);
            let deaths = existing.deaths.max(line.deaths);
            let changed = kills != existing.kills || deaths != existing.deaths;
            existing.kills = kills;
            existing.deaths = deaths;
            changed
        }
        None => {
            scoreboard.insert(line.client_id, line);
            true
        }
    }
}
