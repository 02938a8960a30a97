//! Two-phase reclamation of finished contexts
//!
//! A context cannot free the stack it is running on. When its entry function
//! returns it is *marked* here and switches away; whichever context runs next
//! *collects* the set and drops the payload (the stack) from its own stack.
//!
//! `collect` never hands back the entry belonging to the active context, so a
//! stack is never released while in use even if a caller collects early.

use crate::id::ContextId;

/// Arena of retired payloads keyed by context id
#[derive(Debug)]
pub struct RetiredSet<T> {
    pending: Vec<(ContextId, T)>,
    marked: u64,
    collected: u64,
}

impl<T> Default for RetiredSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RetiredSet<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(2),
            marked: 0,
            collected: 0,
        }
    }

    /// Phase one: remember `payload` for release after the next switch.
    pub fn mark(&mut self, id: ContextId, payload: T) {
        debug_assert!(!self.pending.iter().any(|(p, _)| *p == id));
        self.pending.push((id, payload));
        self.marked += 1;
    }

    /// Phase two: take every pending entry except the one owned by `active`.
    ///
    /// The returned payloads are dropped by the caller, on the active
    /// context's stack.
    pub fn collect(&mut self, active: ContextId) -> Vec<(ContextId, T)> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.pending.len());
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].0 == active {
                i += 1;
            } else {
                out.push(self.pending.swap_remove(i));
            }
        }
        self.collected += out.len() as u64;
        out
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.pending.iter().any(|(p, _)| *p == id)
    }

    /// Entries awaiting collection
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Lifetime count of marked entries
    pub fn marked_total(&self) -> u64 {
        self.marked
    }

    /// Lifetime count of collected entries
    pub fn collected_total(&self) -> u64 {
        self.collected
    }
}
