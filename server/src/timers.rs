//! Deferred actions on the authority tick loop
//!
//! Replaces wall-clock coroutines with tick-stamped entries that the loop
//! collects once due. Entries due on the same tick come out in scheduling
//! order, and any entry can be cancelled before it fires.

use std::collections::BTreeMap;

/// Authority tick counter
pub type Tick = u64;

#[derive(Debug)]
pub struct Timers<A> {
    pending: BTreeMap<(Tick, u64), A>,
    next_seq: u64,
}

impl<A> Timers<A> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Queues `action` to come out of [`Timers::pop_due`] once `due` is reached
    pub fn schedule(&mut self, due: Tick, action: A) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((due, seq), action);
    }

    /// Cancels every pending action matching `predicate`, returning how many
    pub fn cancel_where(&mut self, predicate: impl Fn(&A) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, action| !predicate(action));
        before - self.pending.len()
    }

    /// Removes and returns every action due at or before `now`
    pub fn pop_due(&mut self, now: Tick) -> Vec<A> {
        let Some(after) = now.checked_add(1) else {
            return std::mem::take(&mut self.pending).into_values().collect();
        };
        let later = self.pending.split_off(&(after, 0));
        let due = std::mem::replace(&mut self.pending, later);
        due.into_values().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.pending.values()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<A> Default for Timers<A> {
    fn default() -> Self {
        Self::new()
    }
}
