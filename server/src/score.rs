//! Kill/death bookkeeping and scoreboard replication
//!
//! Records are created the first time a client spawns and survive its
//! respawns. Every change goes out twice: the scoreboard line to everybody
//! and, for kills, the HUD counter to the owner alone.

use crate::outbox::Outbox;
use log::{info, warn};
use shared::{ClientId, Packet, Role, ScoreLine, NON_PLAYER_ID};
use std::collections::BTreeMap;

/// One client's tally for the whole session
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub client_id: ClientId,
    pub nickname: String,
    pub kills: u32,
    pub deaths: u32,
}

impl ScoreRecord {
    fn line(&self) -> ScoreLine {
        ScoreLine {
            client_id: self.client_id,
            nickname: self.nickname.clone(),
            kills: self.kills,
            deaths: self.deaths,
        }
    }
}

/// Canonical scoreboard, keyed by client id
///
/// Only the authority writes to it. Observers keep their own copy built from
/// the scoreboard messages this tracker queues.
pub struct ScoreTracker {
    role: Role,
    records: BTreeMap<ClientId, ScoreRecord>,
}

impl ScoreTracker {
    /// Creates an empty tracker; with `Role::Observer` every write is ignored
    pub fn new(role: Role) -> Self {
        Self {
            role,
            records: BTreeMap::new(),
        }
    }

    /// Called on every spawn; only the first one creates the record
    ///
    /// A new record is announced to everyone as a scoreboard line. On later
    /// spawns the owner is just reminded of its kill count so its HUD picks
    /// up where it left off.
    pub fn register_player(&mut self, client_id: ClientId, nickname: &str, outbox: &mut Outbox) {
        if !self.role.is_authority() {
            return;
        }
        if client_id == NON_PLAYER_ID {
            warn!("Skipping score registration for the non-player id");
            return;
        }

        if let Some(record) = self.records.get(&client_id) {
            outbox.send_to(client_id, Packet::KillScore { kills: record.kills });
            return;
        }

        let record = ScoreRecord {
            client_id,
            nickname: nickname.to_string(),
            kills: 0,
            deaths: 0,
        };
        info!("Scoreboard: added {} ({})", record.nickname, client_id);
        outbox.broadcast(Packet::ScoreboardJoin { line: record.line() });
        self.records.insert(client_id, record);
    }

    /// Credits one kill to `client_id`
    ///
    /// The updated line goes to everyone and the new count goes to the
    /// killer's HUD. Kills for clients without a record are logged and
    /// dropped.
    pub fn register_kill(&mut self, client_id: ClientId, outbox: &mut Outbox) {
        if !self.role.is_authority() {
            return;
        }
        let Some(record) = self.records.get_mut(&client_id) else {
            warn!("Kill for client {} with no score record", client_id);
            return;
        };

        record.kills += 1;
        let kills = record.kills;
        outbox.broadcast(Packet::ScoreboardKills { client_id, kills });
        outbox.send_to(client_id, Packet::KillScore { kills });
    }

    /// Counts one death for `client_id` and broadcasts the new total
    pub fn register_death(&mut self, client_id: ClientId, outbox: &mut Outbox) {
        if !self.role.is_authority() {
            return;
        }
        let Some(record) = self.records.get_mut(&client_id) else {
            warn!("Death for client {} with no score record", client_id);
            return;
        };

        record.deaths += 1;
        outbox.broadcast(Packet::ScoreboardDeaths {
            client_id,
            deaths: record.deaths,
        });
    }

    /// Forgets a departing client's record
    ///
    /// Observers drop the line when they see the roster remove, so nothing
    /// is sent from here.
    pub fn remove(&mut self, client_id: ClientId) -> Option<ScoreRecord> {
        self.records.remove(&client_id)
    }

    /// Every line, ordered by client id
    pub fn snapshot(&self) -> Vec<ScoreLine> {
        self.records.values().map(ScoreRecord::line).collect()
    }

    /// Catch-up for a client that joined mid-match
    pub fn send_snapshot(&self, client_id: ClientId, outbox: &mut Outbox) {
        outbox.send_to(
            client_id,
            Packet::ScoreboardSnapshot {
                lines: self.snapshot(),
            },
        );
    }

    pub fn get(&self, client_id: ClientId) -> Option<&ScoreRecord> {
        self.records.get(&client_id)
    }

    /// Kill count, zero for unknown clients
    pub fn kills(&self, client_id: ClientId) -> u32 {
        self.records.get(&client_id).map_or(0, |r| r.kills)
    }

    pub fn deaths(&self, client_id: ClientId) -> u32 {
        self.records.get(&client_id).map_or(0, |r| r.deaths)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
