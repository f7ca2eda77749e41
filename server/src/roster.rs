//! Canonical session roster and its replication
//!
//! The authority is the only writer. A joining client receives a full
//! snapshot addressed to it alone, and every client (the joiner included)
//! receives an append carrying just the new entry. Both can arrive in any
//! order; observers apply them idempotently, so the snapshot path and the
//! delta path converge on the same roster.
//!
//! Leaving broadcasts a remove to everyone still connected, except during an
//! authority-initiated teardown: then a single `SessionTeardown` goes out and
//! every observer clears its own roster.

use crate::outbox::Outbox;
use log::{debug, info, warn};
use shared::{
    ClientId, Packet, Role, RosterEntry, HOST_SUFFIX, MAX_NICKNAME_BYTES, NON_PLAYER_ID,
};
use std::collections::{BTreeMap, HashMap};

/// Result of the connection approval gate
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub accepted: bool,
    pub display_name: String,
}

impl Approval {
    fn refused() -> Self {
        Self {
            accepted: false,
            display_name: String::new(),
        }
    }
}

/// Authority-side roster: approval gate, host designation and replication
///
/// Mutations are only honoured with `Role::Authority`; an observer instance
/// answers queries but ignores every write.
pub struct RosterSyncService {
    role: Role,
    entries: BTreeMap<ClientId, RosterEntry>,
    /// Registered at approval, before the roster entry exists
    nicknames: HashMap<ClientId, String>,
    host: Option<ClientId>,
    shutting_down: bool,
}

impl RosterSyncService {
    /// Creates an empty, open roster
    pub fn new(role: Role) -> Self {
        Self {
            role,
            entries: BTreeMap::new(),
            nicknames: HashMap::new(),
            host: None,
            shutting_down: false,
        }
    }

    /// Runs the approval gate for a connecting client
    ///
    /// The base policy accepts everyone while the session is open. The first
    /// client approved into an empty session becomes the host.
    pub fn approve(&mut self, client_id: ClientId, payload: &[u8]) -> Approval {
        if !self.role.is_authority() {
            debug!("Ignoring approval for {} on a non-authority roster", client_id);
            return Approval::refused();
        }
        if self.shutting_down {
            info!("Refusing client {}: session is shutting down", client_id);
            return Approval::refused();
        }
        if client_id == NON_PLAYER_ID {
            warn!("Refusing connection using the non-player id");
            return Approval::refused();
        }

        let nickname = decode_nickname(payload, client_id);
        self.nicknames.insert(client_id, nickname);

        if self.host.is_none() && self.entries.is_empty() {
            self.host = Some(client_id);
        }

        Approval {
            accepted: true,
            display_name: self.display_name(client_id),
        }
    }

    /// Inserts the joining client and replicates the roster
    ///
    /// Returns false if nothing changed (observer role, teardown, or the
    /// client is already listed).
    pub fn on_join(&mut self, client_id: ClientId, outbox: &mut Outbox) -> bool {
        if !self.role.is_authority() || self.shutting_down {
            return false;
        }
        if self.entries.contains_key(&client_id) {
            debug!("Client {} already in roster, ignoring duplicate join", client_id);
            return false;
        }

        let entry = RosterEntry {
            client_id,
            display_name: self.display_name(client_id),
            is_host: self.host == Some(client_id),
        };
        info!("Roster: {} joined as '{}'", client_id, entry.display_name);
        self.entries.insert(client_id, entry.clone());

        outbox.send_to(
            client_id,
            Packet::RosterSnapshot {
                entries: self.snapshot(),
            },
        );
        outbox.broadcast(Packet::RosterAppend { entry });
        true
    }

    /// Removes a departing client and tells the remaining clients
    ///
    /// The host leaving clears the host slot; tearing the session down is
    /// the caller's decision. During teardown the remove is suppressed.
    pub fn on_leave(&mut self, client_id: ClientId, outbox: &mut Outbox) -> Option<RosterEntry> {
        if !self.role.is_authority() {
            return None;
        }

        self.nicknames.remove(&client_id);
        let Some(entry) = self.entries.remove(&client_id) else {
            warn!("Roster: leave for unknown client {}", client_id);
            return None;
        };

        if self.host == Some(client_id) {
            self.host = None;
        }

        if self.shutting_down {
            debug!("Roster: remove for {} suppressed during teardown", client_id);
        } else {
            info!("Roster: {} left", client_id);
            outbox.broadcast_except(client_id, Packet::RosterRemove { client_id });
        }
        Some(entry)
    }

    /// Starts an authority-initiated teardown of the whole session
    ///
    /// Sends one `SessionTeardown` to everyone and clears the roster without
    /// any per-client remove messages. Returns the ids that were connected.
    pub fn begin_teardown(&mut self, outbox: &mut Outbox) -> Vec<ClientId> {
        if !self.role.is_authority() || self.shutting_down {
            return Vec::new();
        }

        self.shutting_down = true;
        outbox.broadcast(Packet::SessionTeardown);

        let ids: Vec<ClientId> = self.entries.keys().copied().collect();
        info!("Roster: tearing down session with {} clients", ids.len());
        self.entries.clear();
        self.nicknames.clear();
        self.host = None;
        ids
    }

    /// Nickname registered at approval, or the default for that id
    pub fn nickname(&self, client_id: ClientId) -> String {
        self.nicknames
            .get(&client_id)
            .cloned()
            .unwrap_or_else(|| default_nickname(client_id))
    }

    /// Nickname as shown in the roster, with the host suffix when it applies
    pub fn display_name(&self, client_id: ClientId) -> String {
        let nickname = self.nickname(client_id);
        if self.host == Some(client_id) {
            format!("{}{}", nickname, HOST_SUFFIX)
        } else {
            nickname
        }
    }

    /// Current roster ordered by client id
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn get(&self, client_id: ClientId) -> Option<&RosterEntry> {
        self.entries.get(&client_id)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.entries.contains_key(&client_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.entries.keys().copied()
    }

    /// The client that started the session, until it leaves
    pub fn host(&self) -> Option<ClientId> {
        self.host
    }

    /// Once set, no client is approved or joined again
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_nickname(client_id: ClientId) -> String {
    format!("Player {}", client_id)
}

/// Extracts a nickname from connection payload bytes
///
/// Invalid UTF-8 is replaced, whitespace trimmed, and the result cut to
/// `MAX_NICKNAME_BYTES` on a character boundary.
pub fn decode_nickname(payload: &[u8], client_id: ClientId) -> String {
    let text = String::from_utf8_lossy(payload);
    let trimmed = text.trim();

    let mut end = trimmed.len().min(MAX_NICKNAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let nickname = trimmed[..end].trim_end();

    if nickname.is_empty() {
        default_nickname(client_id)
    } else {
        nickname.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::Delivery;

    fn join(roster: &mut RosterSyncService, id: ClientId, name: &str, outbox: &mut Outbox) {
        assert!(roster.approve(id, name.as_bytes()).accepted);
        assert!(roster.on_join(id, outbox));
    }

    #[test]
    fn test_first_client_becomes_host() {
        let mut roster = RosterSyncService::new(Role::Authority);
        let approval = roster.approve(1, b"Alice");
        assert!(approval.accepted);
        assert_eq!(approval.display_name, "Alice (Host)");

        let mut outbox = Outbox::new();
        roster.on_join(1, &mut outbox);
        let second = roster.approve(2, b"Bob");
        assert_eq!(second.display_name, "Bob");
        assert_eq!(roster.host(), Some(1));
    }

    #[test]
    fn test_join_sends_snapshot_to_joiner_and_append_to_all() {
        let mut roster = RosterSyncService::new(Role::Authority);
        let mut outbox = Outbox::new();
        join(&mut roster, 1, "Alice", &mut outbox);
        outbox.drain();

        join(&mut roster, 2, "Bob", &mut outbox);
        let sent = outbox.drain();
        assert_eq!(sent.len(), 2);

        assert_eq!(sent[0].delivery, Delivery::To(2));
        match &sent[0].packet {
            Packet::RosterSnapshot { entries } => {
                let ids: Vec<ClientId> = entries.iter().map(|e| e.client_id).collect();
                assert_eq!(ids, vec![1, 2]);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }

        assert_eq!(sent[1].delivery, Delivery::All);
        match &sent[1].packet {
            Packet::RosterAppend { entry } => {
                assert_eq!(entry.client_id, 2);
                assert_eq!(entry.display_name, "Bob");
                assert!(!entry.is_host);
            }
            other => panic!("expected append, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_join_is_ignored() {
        let mut roster = RosterSyncService::new(Role::Authority);
        let mut outbox = Outbox::new();
        join(&mut roster, 1, "Alice", &mut outbox);
        outbox.drain();

        assert!(!roster.on_join(1, &mut outbox));
        assert!(outbox.is_empty());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_leave_broadcasts_remove_to_remaining_clients() {
        let mut roster = RosterSyncService::new(Role::Authority);
        let mut outbox = Outbox::new();
        join(&mut roster, 1, "Alice", &mut outbox);
        join(&mut roster, 2, "Bob", &mut outbox);
        outbox.drain();

        let removed = roster.on_leave(2, &mut outbox).unwrap();
        assert_eq!(removed.client_id, 2);

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].delivery, Delivery::AllExcept(2));
        assert!(matches!(sent[0].packet, Packet::RosterRemove { client_id: 2 }));
    }

    #[test]
    fn test_leave_unknown_client_is_skipped() {
        let mut roster = RosterSyncService::new(Role::Authority);
        let mut outbox = Outbox::new();
        assert!(roster.on_leave(99, &mut outbox).is_none());
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_teardown_suppresses_removes() {
        let mut roster = RosterSyncService::new(Role::Authority);
        let mut outbox = Outbox::new();
        for (id, name) in [(1, "Host"), (2, "A"), (3, "B"), (4, "C"), (5, "D")] {
            join(&mut roster, id, name, &mut outbox);
        }
        outbox.drain();

        let ids = roster.begin_teardown(&mut outbox);
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        for id in ids {
            assert!(roster.on_leave(id, &mut outbox).is_none());
        }

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].packet, Packet::SessionTeardown));
        assert!(roster.is_empty());
        assert!(!roster.approve(6, b"Late").accepted);
        assert!(!roster.on_join(6, &mut outbox));
    }

    #[test]
    fn test_observer_role_ignores_mutations() {
        let mut roster = RosterSyncService::new(Role::Observer);
        let mut outbox = Outbox::new();

        assert!(!roster.approve(1, b"Alice").accepted);
        assert!(!roster.on_join(1, &mut outbox));
        assert!(roster.on_leave(1, &mut outbox).is_none());
        assert!(roster.begin_teardown(&mut outbox).is_empty());
        assert!(outbox.is_empty());
        assert!(roster.is_empty());
    }

    #[test]
    fn test_sentinel_id_is_refused() {
        let mut roster = RosterSyncService::new(Role::Authority);
        assert!(!roster.approve(NON_PLAYER_ID, b"bot").accepted);
    }

    #[test]
    fn test_decode_nickname() {
        assert_eq!(decode_nickname(b"  Alice  ", 1), "Alice");
        assert_eq!(decode_nickname(b"", 7), "Player 7");
        assert_eq!(decode_nickname(b"   ", 7), "Player 7");
        assert_eq!(decode_nickname(&[0xff, b'x'], 1), "\u{fffd}x");

        let long = "é".repeat(40);
        let decoded = decode_nickname(long.as_bytes(), 1);
        assert!(decoded.len() <= MAX_NICKNAME_BYTES);
        assert_eq!(decoded, "é".repeat(16));
    }

    #[test]
    fn test_nickname_registered_before_entry_exists() {
        let mut roster = RosterSyncService::new(Role::Authority);
        roster.approve(3, b"Carol");
        assert!(!roster.contains(3));
        assert_eq!(roster.nickname(3), "Carol");
        assert_eq!(roster.nickname(4), "Player 4");
    }
}
