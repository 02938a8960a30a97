//! Error types for the uthread scheduler

use core::fmt;
use crate::id::LockId;

/// Result type for scheduler operations
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Errors that can occur in scheduler operations
///
/// Every error is reported before any scheduler state is touched, so a
/// failed call leaves queues, lock holders and waiters exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// Scheduler not started on this thread
    NotInitialized,

    /// Scheduler already started (second bootstrap, nested run, second
    /// preemption setup)
    AlreadyInitialized,

    /// Release or wait on a lock nobody holds
    LockNotHeld(LockId),

    /// Release or wait on a lock held by a different context
    NotOwner(LockId),

    /// Acquire of a lock the caller already holds
    AlreadyHeld(LockId),

    /// Stack allocation/protection failed
    MemoryError(MemoryError),

    /// Platform-specific error (errno)
    PlatformError(i32),

    /// Scheduler configuration rejected at startup
    InvalidConfig(&'static str),
}

/// Broad category of a [`ThreadError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Call made in the wrong lifecycle phase
    Sequencing,
    /// Caller does not (or already does) own the lock
    Ownership,
    /// Allocation failure during creation
    Resource,
}

impl ThreadError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ThreadError::NotInitialized
            | ThreadError::AlreadyInitialized
            | ThreadError::InvalidConfig(_) => {
                ErrorClass::Sequencing
            }
            ThreadError::LockNotHeld(_)
            | ThreadError::NotOwner(_)
            | ThreadError::AlreadyHeld(_) => ErrorClass::Ownership,
            ThreadError::MemoryError(_) | ThreadError::PlatformError(_) => ErrorClass::Resource,
        }
    }
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::NotInitialized => write!(f, "thread library not initialized"),
            ThreadError::AlreadyInitialized => write!(f, "thread library already initialized"),
            ThreadError::LockNotHeld(lock) => write!(f, "lock {} is not held", lock),
            ThreadError::NotOwner(lock) => write!(f, "lock {} is held by another context", lock),
            ThreadError::AlreadyHeld(lock) => write!(f, "lock {} is already held by caller", lock),
            ThreadError::MemoryError(e) => write!(f, "memory error: {}", e),
            ThreadError::PlatformError(code) => write!(f, "platform error: {}", code),
            ThreadError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ThreadError {}

/// Memory-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed
    AllocationFailed,

    /// mprotect failed on the guard page
    ProtectionFailed,

    /// Requested size overflows or is zero
    InvalidSize,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AllocationFailed => write!(f, "stack allocation failed"),
            MemoryError::ProtectionFailed => write!(f, "guard page protection failed"),
            MemoryError::InvalidSize => write!(f, "invalid stack size"),
        }
    }
}

impl From<MemoryError> for ThreadError {
    fn from(e: MemoryError) -> Self {
        ThreadError::MemoryError(e)
    }
}
