//! Condition variable wait queues, addressed by (lock id, condition id)
//!
//! MESA discipline: waking a context only moves it back towards the ready
//! queue. It still has to re-acquire the lock itself before its `wait`
//! returns, so the predicate it waited for may no longer hold.

use std::collections::{HashMap, VecDeque};
use crate::id::{ConditionKey, ContextId};

/// Condition key -> FIFO waiters
#[derive(Debug, Default)]
pub struct ConditionTable {
    conds: HashMap<ConditionKey, VecDeque<ContextId>>,
}

impl ConditionTable {
    pub fn new() -> Self {
        Self { conds: HashMap::new() }
    }

    /// Append `who` to the wait queue of `key`.
    ///
    /// The caller must already have released the associated lock on behalf
    /// of `who`.
    pub fn enqueue(&mut self, key: ConditionKey, who: ContextId) {
        let waiters = self.conds.entry(key).or_default();
        debug_assert!(!waiters.contains(&who));
        waiters.push_back(who);
    }

    /// Remove the longest waiter on `key`. `None` when nobody waits.
    pub fn wake_one(&mut self, key: ConditionKey) -> Option<ContextId> {
        self.conds.get_mut(&key).and_then(|q| q.pop_front())
    }

    /// Remove every waiter on `key`, longest-waiting first.
    pub fn wake_all(&mut self, key: ConditionKey) -> Vec<ContextId> {
        match self.conds.get_mut(&key) {
            Some(q) => q.drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Waiters on `key`, longest-waiting first
    pub fn waiters(&self, key: ConditionKey) -> Vec<ContextId> {
        self.conds
            .get(&key)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Total contexts waiting on any condition
    pub fn blocked_count(&self) -> usize {
        self.conds.values().map(|q| q.len()).sum()
    }

    /// Conditions with at least one waiter, in key order
    pub fn snapshot(&self) -> Vec<(ConditionKey, usize)> {
        let mut out: Vec<_> = self
            .conds
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(k, q)| (*k, q.len()))
            .collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(i: u32) -> ContextId {
        ContextId::new(i)
    }

    #[test]
    fn test_signal_without_waiters_is_noop() {
        let mut t = ConditionTable::new();
        let key = ConditionKey::new(1, 1);
        assert_eq!(t.wake_one(key), None);
        assert!(t.wake_all(key).is_empty());
        assert_eq!(t.blocked_count(), 0);
    }

    #[test]
    fn test_wake_one_is_fifo() {
        let mut t = ConditionTable::new();
        let key = ConditionKey::new(1, 2);
        t.enqueue(key, ctx(10));
        t.enqueue(key, ctx(11));
        t.enqueue(key, ctx(12));

        assert_eq!(t.wake_one(key), Some(ctx(10)));
        assert_eq!(t.waiters(key), vec![ctx(11), ctx(12)]);
    }

    #[test]
    fn test_wake_all_drains_in_order() {
        let mut t = ConditionTable::new();
        let key = ConditionKey::new(3, 0);
        for i in 0..5 {
            t.enqueue(key, ctx(i));
        }
        let woken: Vec<u32> = t.wake_all(key).into_iter().map(|c| c.as_u32()).collect();
        assert_eq!(woken, vec![0, 1, 2, 3, 4]);
        assert!(t.waiters(key).is_empty());
    }

    #[test]
    fn test_keys_are_scoped_by_lock() {
        let mut t = ConditionTable::new();
        t.enqueue(ConditionKey::new(1, 7), ctx(1));
        t.enqueue(ConditionKey::new(2, 7), ctx(2));

        assert_eq!(t.wake_one(ConditionKey::new(2, 7)), Some(ctx(2)));
        assert_eq!(t.waiters(ConditionKey::new(1, 7)), vec![ctx(1)]);
        assert_eq!(t.snapshot(), vec![(ConditionKey::new(1, 7), 1)]);
    }
}
