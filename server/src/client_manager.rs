//! Connected client tracking and intent queuing
//!
//! This module owns the transport side of every connection:
//! - Client id allocation (ids start at 1, the non-player id is never issued)
//! - Address lookup for incoming datagrams and outgoing deliveries
//! - Per-client intent buffers ordered by sequence number
//! - Inactivity timeouts and capacity limits
//!
//! Intents are only ordered per client. The session drains them once per
//! tick and applies each client's batch in sequence order; intents older
//! than the newest one already applied are dropped as stale.

use log::{debug, info};
use shared::{ClientId, Vec3, NON_PLAYER_ID};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A gameplay request from an observer, validated by the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Move { direction: Vec3 },
    Aim { point: Vec3 },
    Shoot { target: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencedIntent {
    pub sequence: u32,
    pub intent: Intent,
}

#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client
    pub last_seen: Instant,
    /// Highest intent sequence already handed to the session
    pub last_processed: u32,
    pub pending: Vec<SequencedIntent>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed: 0,
            pending: Vec::new(),
        }
    }

    /// Buffers an intent in sequence order; returns false if it is stale
    pub fn add_intent(&mut self, sequence: u32, intent: Intent) -> bool {
        self.last_seen = Instant::now();
        if sequence <= self.last_processed {
            return false;
        }
        self.pending.push(SequencedIntent { sequence, intent });
        // Datagrams may arrive out of order
        self.pending.sort_by_key(|i| i.sequence);
        true
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    next_client_id: ClientId,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, Duration::from_secs(5))
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Registers a new connection; `None` when the server is full
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ClientId> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;
        if self.next_client_id == NON_PLAYER_ID {
            self.next_client_id = 1;
        }

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: ClientId) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: ClientId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|c| c.addr)
    }

    pub fn add_intent(&mut self, client_id: ClientId, sequence: u32, intent: Intent) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                let accepted = client.add_intent(sequence, intent);
                if !accepted {
                    debug!("Dropping stale intent {} from client {}", sequence, client_id);
                }
                accepted
            }
            None => false,
        }
    }

    /// Marks a client as alive without queuing anything
    pub fn touch(&mut self, client_id: ClientId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    /// Takes every buffered intent, grouped by client id and in sequence order
    pub fn drain_intents(&mut self) -> Vec<(ClientId, Intent)> {
        let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
        ids.sort_unstable();

        let mut drained = Vec::new();
        for id in ids {
            let Some(client) = self.clients.get_mut(&id) else {
                continue;
            };
            if let Some(last) = client.pending.last() {
                client.last_processed = client.last_processed.max(last.sequence);
            }
            drained.extend(client.pending.drain(..).map(|i| (id, i.intent)));
        }
        drained
    }

    /// Removes clients that have been silent past the timeout
    pub fn check_timeouts(&mut self) -> Vec<ClientId> {
        let timeout = self.timeout;
        let timed_out: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            info!("Client {} timed out", client_id);
            self.remove_client(*client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn step(x: f32) -> Intent {
        Intent::Move {
            direction: Vec3::new(x, 0.0, 0.0),
        }
    }

    #[test]
    fn test_client_orders_intents_by_sequence() {
        let mut client = Client::new(1, test_addr());
        client.add_intent(2, step(2.0));
        client.add_intent(1, step(1.0));

        assert_eq!(client.pending.len(), 2);
        assert_eq!(client.pending[0].sequence, 1);
        assert_eq!(client.pending[1].sequence, 2);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client_assigns_increasing_ids() {
        let mut manager = ClientManager::new(3);
        assert_eq!(manager.add_client(test_addr()), Some(1));
        assert_eq!(manager.add_client(test_addr2()), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.is_full());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(id));
        assert!(!manager.remove_client(id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let id1 = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(id1));
        assert_eq!(manager.addr_of(id1), Some(test_addr()));

        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown), None);
    }

    #[test]
    fn test_add_intent_to_unknown_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.add_intent(999, 1, step(1.0)));
    }

    #[test]
    fn test_drain_intents_per_client_order() {
        let mut manager = ClientManager::new(3);
        let a = manager.add_client(test_addr()).unwrap();
        let b = manager.add_client(test_addr2()).unwrap();

        manager.add_intent(b, 1, step(10.0));
        manager.add_intent(a, 3, step(3.0));
        manager.add_intent(a, 2, step(2.0));

        let drained = manager.drain_intents();
        assert_eq!(
            drained,
            vec![(a, step(2.0)), (a, step(3.0)), (b, step(10.0))]
        );
        assert!(manager.drain_intents().is_empty());
    }

    #[test]
    fn test_stale_intents_are_dropped() {
        let mut manager = ClientManager::new(1);
        let id = manager.add_client(test_addr()).unwrap();

        manager.add_intent(id, 5, step(5.0));
        manager.drain_intents();

        assert!(!manager.add_intent(id, 4, step(4.0)));
        assert!(!manager.add_intent(id, 5, step(5.0)));
        assert!(manager.add_intent(id, 6, step(6.0)));
    }

    #[test]
    fn test_check_timeouts_removes_silent_clients() {
        let mut manager = ClientManager::with_timeout(2, Duration::from_millis(10));
        let id = manager.add_client(test_addr()).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(manager.check_timeouts(), vec![id]);
        assert!(manager.is_empty());
    }
}
