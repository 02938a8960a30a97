//! # uthread-runtime
//!
//! Platform-specific runtime for the uthread scheduler.
//!
//! This crate provides:
//! - Stack allocation with guard pages (mmap)
//! - Context switching (architecture-specific assembly)
//! - The per-thread scheduler: dispatch, locks, conditions, reclamation
//! - Interrupt suppression and the two preemption sources
//! - Alarm thread + SIGALRM handler for asynchronous preemption

pub mod config;
pub mod memory;
pub mod arch;
pub mod context;
pub mod interrupt;
pub mod signal;
pub mod timer;
pub mod scheduler;
pub mod tls;

// Re-exports
pub use config::{ConfigError, PreemptionConfig, SchedulerConfig};
pub use scheduler::{
    bootstrap, broadcast, current_id, debug_dump, lock, run_hosted, signal, spawn,
    start_preemptions, stats, unlock, wait, yield_now, RunMode, RunStats,
};

// Platform detection
cfg_if::cfg_if! {
    if #[cfg(not(unix))] {
        compile_error!("uthread-runtime supports unix targets only");
    } else if #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))] {
        compile_error!("Unsupported architecture");
    }
}
