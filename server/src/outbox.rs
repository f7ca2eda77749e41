//! Outgoing replication messages and their audiences
//!
//! Services never touch sockets. They describe who should receive a packet
//! and the network layer resolves the audience to addresses when it flushes.

use shared::{ClientId, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The owning (or joining) client only
    To(ClientId),
    /// Every connected client
    All,
    /// Every connected client except one, typically the one that just left
    AllExcept(ClientId),
}

impl Delivery {
    pub fn includes(self, client_id: ClientId) -> bool {
        match self {
            Delivery::To(target) => target == client_id,
            Delivery::All => true,
            Delivery::AllExcept(excluded) => excluded != client_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outgoing {
    pub delivery: Delivery,
    pub packet: Packet,
}

/// Messages queued during a mutation, flushed once per loop iteration
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Outgoing>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_to(&mut self, client_id: ClientId, packet: Packet) {
        self.push(Delivery::To(client_id), packet);
    }

    pub fn broadcast(&mut self, packet: Packet) {
        self.push(Delivery::All, packet);
    }

    pub fn broadcast_except(&mut self, excluded: ClientId, packet: Packet) {
        self.push(Delivery::AllExcept(excluded), packet);
    }

    pub fn push(&mut self, delivery: Delivery, packet: Packet) {
        self.queue.push(Outgoing { delivery, packet });
    }

    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.queue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outgoing> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_audience() {
        assert!(Delivery::To(3).includes(3));
        assert!(!Delivery::To(3).includes(4));
        assert!(Delivery::All.includes(42));
        assert!(!Delivery::AllExcept(5).includes(5));
        assert!(Delivery::AllExcept(5).includes(6));
    }

    #[test]
    fn test_drain_empties_queue_in_order() {
        let mut outbox = Outbox::new();
        outbox.send_to(1, Packet::HealthChanged { health: 90.0 });
        outbox.broadcast(Packet::SessionTeardown);

        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].delivery, Delivery::To(1));
        assert_eq!(drained[1].delivery, Delivery::All);
        assert!(outbox.is_empty());
    }
}
