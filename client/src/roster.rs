//! Observer copy of the session roster
//!
//! Snapshots and appends can arrive in either order and may repeat. Both
//! only ever add entries that are missing, so whichever lands first wins and
//! the roster ends up with exactly one entry per client.

use log::debug;
use shared::{ClientId, RosterEntry};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct ObserverRoster {
    entries: BTreeMap<ClientId, RosterEntry>,
}

impl ObserverRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a full roster; returns how many entries were new
    pub fn apply_snapshot(&mut self, entries: Vec<RosterEntry>) -> usize {
        entries
            .into_iter()
            .filter(|entry| self.apply_append(entry.clone()))
            .count()
    }

    pub fn apply_append(&mut self, entry: RosterEntry) -> bool {
        if self.entries.contains_key(&entry.client_id) {
            debug!("Roster already has {}, discarding duplicate", entry.client_id);
            return false;
        }
        self.entries.insert(entry.client_id, entry);
        true
    }

    pub fn apply_remove(&mut self, client_id: ClientId) -> bool {
        self.entries.remove(&client_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, client_id: ClientId) -> Option<&RosterEntry> {
        self.entries.get(&client_id)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.entries.contains_key(&client_id)
    }

    pub fn host(&self) -> Option<&RosterEntry> {
        self.entries.values().find(|e| e.is_host)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
