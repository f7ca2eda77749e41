//! Typed publish/subscribe channels
//!
//! An [`EventBus`] carries one event type (a "topic") from any number of
//! publishers to any number of subscribers. Services own their bus and hand
//! out [`Subscription`]s; dropping a subscription unsubscribes it, so a
//! subscriber's interest never outlives the component holding it.
//!
//! The authority tick loop consumes events synchronously with
//! [`Subscription::drain`], which preserves publish order and never blocks.
//! Async consumers (for example a logging task on an observer) can await
//! [`Subscription::recv`] instead.

use log::{trace, warn};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

/// Events buffered per subscriber before the oldest ones are dropped
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    topic: &'static str,
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    pub fn new(topic: &'static str) -> Self {
        Self::with_capacity(topic, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(topic: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { topic, sender }
    }

    /// Publishes an event, returning how many subscribers will see it
    ///
    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("[{}] event published with no subscribers", self.topic);
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription<E> {
        Subscription {
            topic: self.topic,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }
}

#[derive(Debug)]
pub struct Subscription<E: Clone> {
    topic: &'static str,
    receiver: broadcast::Receiver<E>,
}

impl<E: Clone> Subscription<E> {
    /// Returns every pending event in publish order without waiting
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("[{}] subscriber lagged, {} events dropped", self.topic, skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }

    /// Waits for the next event; `None` once every publisher is gone
    pub async fn recv(&mut self) -> Option<E> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[{}] subscriber lagged, {} events dropped", self.topic, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Spawned(u64),
        Died(u64),
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus: EventBus<TestEvent> = EventBus::new("test");
        assert_eq!(bus.publish(TestEvent::Spawned(1)), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_drain_preserves_publish_order() {
        let bus = EventBus::new("test");
        let mut sub = bus.subscribe();

        bus.publish(TestEvent::Spawned(1));
        bus.publish(TestEvent::Died(1));
        bus.publish(TestEvent::Spawned(2));

        assert_eq!(
            sub.drain(),
            vec![
                TestEvent::Spawned(1),
                TestEvent::Died(1),
                TestEvent::Spawned(2)
            ]
        );
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_each_subscriber_sees_every_event() {
        let bus = EventBus::new("test");
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish(TestEvent::Died(7)), 2);
        assert_eq!(first.drain(), vec![TestEvent::Died(7)]);
        assert_eq!(second.drain(), vec![TestEvent::Died(7)]);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus: EventBus<TestEvent> = EventBus::new("test");
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_lagged_subscriber_keeps_newest_events() {
        let bus = EventBus::with_capacity("test", 2);
        let mut sub = bus.subscribe();
        for id in 0..5 {
            bus.publish(TestEvent::Spawned(id));
        }
        assert_eq!(
            sub.drain(),
            vec![TestEvent::Spawned(3), TestEvent::Spawned(4)]
        );
    }

    #[tokio::test]
    async fn test_async_recv() {
        let bus = EventBus::new("test");
        let mut sub = bus.subscribe();
        bus.publish(TestEvent::Spawned(3));
        assert_eq!(sub.recv().await, Some(TestEvent::Spawned(3)));

        drop(bus);
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_recv_skips_past_lag() {
        let bus = EventBus::with_capacity("test", 2);
        let mut sub = bus.subscribe();
        for id in 0..4 {
            bus.publish(TestEvent::Died(id));
        }
        let first = tokio_test::block_on(sub.recv());
        assert_eq!(first, Some(TestEvent::Died(2)));
    }
}
