//! Integer-addressed locks with FIFO hand-off
//!
//! A lock springs into existence the first time its id is acquired and its
//! entry is never removed afterwards, so the table grows with the number of
//! distinct ids ever used rather than with the number currently held.
//!
//! Release hands the lock straight to the longest waiter: the waiter becomes
//! holder before it runs again and never re-contends.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use crate::error::{ThreadError, ThreadResult};
use crate::id::{ContextId, LockId};

/// Outcome of [`LockTable::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// Caller is now the holder
    Granted,
    /// Caller was appended to the waiter queue and must suspend
    Queued,
}

#[derive(Debug, Default)]
struct LockEntry {
    holder: Option<ContextId>,
    waiters: VecDeque<ContextId>,
}

/// Lock id -> holder + FIFO waiters
#[derive(Debug, Default)]
pub struct LockTable {
    locks: HashMap<LockId, LockEntry>,
}

impl LockTable {
    pub fn new() -> Self {
        Self { locks: HashMap::new() }
    }

    /// Take `lock` for `who`, or queue `who` behind the current holder.
    ///
    /// Fails with [`ThreadError::AlreadyHeld`] instead of self-deadlocking.
    pub fn acquire(&mut self, lock: LockId, who: ContextId) -> ThreadResult<Acquire> {
        let entry = match self.locks.entry(lock) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(LockEntry::default()),
        };

        match entry.holder {
            None => {
                entry.holder = Some(who);
                Ok(Acquire::Granted)
            }
            Some(holder) if holder == who => Err(ThreadError::AlreadyHeld(lock)),
            Some(_) => {
                debug_assert!(!entry.waiters.contains(&who));
                entry.waiters.push_back(who);
                Ok(Acquire::Queued)
            }
        }
    }

    /// Verify that `who` may release `lock` without changing anything.
    pub fn check_owner(&self, lock: LockId, who: ContextId) -> ThreadResult<()> {
        match self.locks.get(&lock).and_then(|e| e.holder) {
            None => Err(ThreadError::LockNotHeld(lock)),
            Some(holder) if holder != who => Err(ThreadError::NotOwner(lock)),
            Some(_) => Ok(()),
        }
    }

    /// Release `lock` held by `who`.
    ///
    /// Returns the waiter that now holds the lock, if any. The caller is
    /// responsible for putting it on the ready queue.
    pub fn release(&mut self, lock: LockId, who: ContextId) -> ThreadResult<Option<ContextId>> {
        self.check_owner(lock, who)?;

        // check_owner guarantees the entry exists
        let entry = match self.locks.get_mut(&lock) {
            Some(entry) => entry,
            None => return Err(ThreadError::LockNotHeld(lock)),
        };

        let successor = entry.waiters.pop_front();
        entry.holder = successor;
        Ok(successor)
    }

    /// Current holder of `lock`
    pub fn holder(&self, lock: LockId) -> Option<ContextId> {
        self.locks.get(&lock).and_then(|e| e.holder)
    }

    /// Whether `who` is the holder of any lock
    pub fn holds_any(&self, who: ContextId) -> bool {
        self.locks.values().any(|e| e.holder == Some(who))
    }

    /// Waiters on `lock`, longest-waiting first
    pub fn waiters(&self, lock: LockId) -> Vec<ContextId> {
        self.locks
            .get(&lock)
            .map(|e| e.waiters.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of distinct lock ids ever used
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Total contexts queued on any lock
    pub fn blocked_count(&self) -> usize {
        self.locks.values().map(|e| e.waiters.len()).sum()
    }

    /// Locks in id order with holder and waiter count (for diagnostics)
    pub fn snapshot(&self) -> Vec<(LockId, Option<ContextId>, usize)> {
        let mut out: Vec<_> = self
            .locks
            .iter()
            .map(|(id, e)| (*id, e.holder, e.waiters.len()))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out
    }
}
