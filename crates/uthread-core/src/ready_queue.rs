//! FIFO run queue
//!
//! Contexts are appended at the tail and dispatched from the head, so among
//! contexts that are ready at the same time none runs twice before every
//! other one has run once.

use std::collections::VecDeque;
use crate::id::ContextId;

/// Ordered set of contexts eligible to run
#[derive(Debug, Default)]
pub struct ReadyQueue {
    queue: VecDeque<ContextId>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }

    /// Pre-size the queue so pushes made while interrupts are suppressed do
    /// not reallocate in the common case.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { queue: VecDeque::with_capacity(capacity) }
    }

    /// Make a context ready to run (appends at the tail)
    #[inline]
    pub fn push(&mut self, id: ContextId) {
        debug_assert!(id.is_some());
        debug_assert!(!self.queue.contains(&id), "context {} queued twice", id);
        self.queue.push_back(id);
    }

    /// Remove the longest-waiting context
    #[inline]
    pub fn pop(&mut self) -> Option<ContextId> {
        self.queue.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.queue.contains(&id)
    }

    /// Iterate head to tail
    pub fn iter(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.queue.iter().copied()
    }
}
