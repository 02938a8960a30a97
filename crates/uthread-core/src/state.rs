//! Context lifecycle state

use core::fmt;

/// State of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    /// In the ready queue, or holding a lock it was just handed
    Ready = 0,

    /// The one context currently executing
    Running = 1,

    /// Queued behind the holder of a lock
    BlockedOnLock = 2,

    /// Queued on a condition variable
    BlockedOnCond = 3,

    /// Entry function returned; stack awaits reclamation
    Retired = 4,
}

impl ContextState {
    /// Check if this state allows the context to be dispatched
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, ContextState::Ready)
    }

    /// Check if the context is waiting on a lock or condition
    #[inline]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, ContextState::BlockedOnLock | ContextState::BlockedOnCond)
    }

    #[inline]
    pub const fn is_retired(&self) -> bool {
        matches!(self, ContextState::Retired)
    }
}

impl From<u8> for ContextState {
    fn from(v: u8) -> Self {
        match v {
            0 => ContextState::Ready,
            1 => ContextState::Running,
            2 => ContextState::BlockedOnLock,
            3 => ContextState::BlockedOnCond,
            _ => ContextState::Retired,
        }
    }
}

impl From<ContextState> for u8 {
    fn from(state: ContextState) -> u8 {
        state as u8
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Ready => write!(f, "READY"),
            ContextState::Running => write!(f, "RUNNING"),
            ContextState::BlockedOnLock => write!(f, "BLOCKED_ON_LOCK"),
            ContextState::BlockedOnCond => write!(f, "BLOCKED_ON_COND"),
            ContextState::Retired => write!(f, "RETIRED"),
        }
    }
}
