//! Library defaults, overridable through `UTHREAD_*` environment variables

use uthread_core::constants;

/// Usable stack bytes per context
pub const STACK_SIZE: usize = constants::STACK_SIZE;

/// Alarm period for asynchronous preemption
pub const TIMER_INTERVAL_MS: u64 = 10;

/// Synchronous preemption fires on one in this many interrupt transitions
pub const SYNC_PREEMPT_ONE_IN: u32 = 2;

/// Initial ready queue capacity
pub const READY_QUEUE_CAPACITY: usize = 64;

/// Raise the log level to debug when the scheduler starts
pub const DEBUG_LOGGING: bool = false;
