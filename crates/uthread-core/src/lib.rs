//! # uthread-core
//!
//! Core types for the uthread scheduler.
//!
//! This crate is platform-agnostic and contains no OS-specific code and no
//! context switching. Everything here is plain bookkeeping that the runtime
//! drives while interrupts are suppressed, which keeps it testable on its own.
//!
//! ## Modules
//!
//! - `id` - Context, lock and condition identifiers
//! - `state` - Context lifecycle state
//! - `ready_queue` - FIFO run queue
//! - `lock_table` - Integer-addressed locks with FIFO hand-off
//! - `cond_table` - (lock, cond)-addressed MESA wait queues
//! - `retired` - Two-phase reclamation arena for finished contexts
//! - `rng` - Seeded generator for reproducible preemption
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod ready_queue;
pub mod lock_table;
pub mod cond_table;
pub mod retired;
pub mod rng;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::{ConditionKey, ContextId, CondId, LockId};
pub use state::ContextState;
pub use ready_queue::ReadyQueue;
pub use lock_table::{Acquire, LockTable};
pub use cond_table::ConditionTable;
pub use retired::RetiredSet;
pub use rng::SeededRng;
pub use error::{ErrorClass, MemoryError, ThreadError, ThreadResult};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Constants for memory layout
pub mod constants {
    /// Usable stack bytes per context
    pub const STACK_SIZE: usize = 262_144;

    /// Guard page below every stack (4 KB)
    pub const GUARD_SIZE: usize = 4096;

    /// Smallest stack the config accepts
    pub const MIN_STACK_SIZE: usize = 64 * 1024;

    /// No context sentinel value
    pub const CONTEXT_NONE: u32 = u32::MAX;
}
