//! Context, lock and condition identifiers

use core::fmt;

/// Lock identifier. Any value is valid; locks are created on first use.
pub type LockId = u32;

/// Condition identifier, scoped to a lock.
pub type CondId = u32;

/// Handle of a schedulable context
///
/// Indexes the scheduler's context table. Ids of reclaimed contexts are
/// reused, so a handle is only meaningful while its context is alive.
/// The maximum value (u32::MAX) is reserved as a sentinel for "no context".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ContextId(u32);

impl ContextId {
    /// Sentinel value indicating no context
    pub const NONE: ContextId = ContextId(u32::MAX);

    #[inline]
    pub const fn new(id: u32) -> Self {
        ContextId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<ContextId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u32> for ContextId {
    #[inline]
    fn from(id: u32) -> Self {
        ContextId(id)
    }
}

impl From<ContextId> for u32 {
    #[inline]
    fn from(id: ContextId) -> Self {
        id.0
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "ContextId(NONE)")
        } else {
            write!(f, "ContextId({})", self.0)
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for ContextId {
    fn default() -> Self {
        ContextId::NONE
    }
}

/// Address of a condition variable: the lock it belongs to plus its own id.
///
/// Ordered by lock first, then condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConditionKey {
    pub lock: LockId,
    pub cond: CondId,
}

impl ConditionKey {
    #[inline]
    pub const fn new(lock: LockId, cond: CondId) -> Self {
        Self { lock, cond }
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lock, self.cond)
    }
}
