//! # uthread - user-level cooperative threads
//!
//! Many contexts multiplexed on one OS thread, each with its own stack,
//! scheduled in strict FIFO order. Synchronization is by integer-named
//! locks with FIFO hand-off and MESA condition variables addressed by
//! `(lock, cond)`. Preemption is optional: a periodic alarm, a seeded
//! pseudo-random source that replays the same schedule for the same seed,
//! or both.
//!
//! ## Quick Start
//!
//! ```ignore
//! use uthread::{Runtime, SchedulerConfig, spawn, lock, unlock};
//!
//! fn main() {
//!     let mut runtime = Runtime::new(SchedulerConfig::from_env()).unwrap();
//!
//!     let stats = runtime.block_on(|| {
//!         for i in 0..3 {
//!             spawn(move || {
//!                 lock(1).unwrap();
//!                 println!("context {} has the lock", i);
//!                 unlock(1).unwrap();
//!             }).unwrap();
//!         }
//!     }).unwrap();
//!
//!     println!("{} contexts ran", stats.spawned);
//! }
//! ```
//!
//! A program that lives entirely inside the scheduler uses [`bootstrap`]
//! instead; it never returns and exits the process once no context can run.
//!
//! ## Layout
//!
//! ```text
//!   uthread          public API, Runtime
//!     |
//!   uthread-runtime  scheduler, stacks, context switch, alarm signal
//!     |
//!   uthread-core     ids, ready queue, lock/condition tables, errors, kprint
//! ```

// Re-export core types
pub use uthread_core::{
    CondId,
    ConditionKey,
    ContextId,
    ContextState,
    ErrorClass,
    LockId,
    MemoryError,
    ThreadError,
    ThreadResult,
};

// Re-export kprint macros for debug logging
pub use uthread_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use uthread_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use uthread_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types and operations
pub use uthread_runtime::{
    ConfigError,
    PreemptionConfig,
    RunStats,
    SchedulerConfig,
    broadcast,
    current_id,
    debug_dump,
    lock,
    signal,
    spawn,
    start_preemptions,
    stats,
    unlock,
    wait,
    yield_now,
};

use std::convert::Infallible;

/// Handle for running a scheduler on the calling OS thread
///
/// Each [`block_on`](Runtime::block_on) is an independent run: fresh
/// tables, fresh counters, preemption disarmed. Runtimes on different OS
/// threads never share state.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: SchedulerConfig,
}

impl Runtime {
    /// Create a runtime with the given configuration
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run `f` as the first context and return once no context can run.
    ///
    /// Fails with `AlreadyInitialized` when called from inside a context.
    pub fn block_on<F>(&mut self, f: F) -> ThreadResult<RunStats>
    where
        F: FnOnce() + 'static,
    {
        uthread_runtime::run_hosted(self.config.clone(), f)
    }
}

/// Start the process-wide scheduler with `f` as the first context.
///
/// Configuration comes from the environment. Never returns on success:
/// when no context can run the process prints `Thread library exiting.`
/// and exits with status 0. A second call fails with `AlreadyInitialized`.
pub fn bootstrap<F>(f: F) -> Result<Infallible, ThreadError>
where
    F: FnOnce() + 'static,
{
    bootstrap_with(SchedulerConfig::from_env(), f)
}

/// [`bootstrap`] with an explicit configuration
pub fn bootstrap_with<F>(config: SchedulerConfig, f: F) -> Result<Infallible, ThreadError>
where
    F: FnOnce() + 'static,
{
    uthread_runtime::bootstrap(config, f)
}

/// Check if currently executing within a context
#[inline]
pub fn is_in_context() -> bool {
    current_id().is_some()
}

#[cfg(test)]
mod tests;
