//! Scheduler configuration
//!
//! Library defaults with runtime environment overrides (highest wins):
//!
//! 1. Builder calls on [`SchedulerConfig`]
//! 2. Environment variables, read by [`SchedulerConfig::from_env`]
//! 3. Library defaults in [`defaults`]
//!
//! # Example
//!
//! ```rust,ignore
//! use uthread_runtime::config::SchedulerConfig;
//!
//! let config = SchedulerConfig::from_env()
//!     .stack_size(128 * 1024)
//!     .timer_interval(Duration::from_millis(2));
//! ```

pub mod defaults;

use std::time::Duration;
use uthread_core::constants::MIN_STACK_SIZE;
use uthread_core::env::{env_get, env_get_bool};
use uthread_core::ThreadError;

/// Scheduler configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Usable stack bytes per context
    pub stack_size: usize,
    /// Alarm period for asynchronous preemption
    pub timer_interval: Duration,
    /// Synchronous preemption fires on average once per this many
    /// interrupt enable/disable transitions
    pub sync_preempt_one_in: u32,
    /// Initial ready queue capacity
    pub ready_queue_capacity: usize,
    /// Raise the log level to debug when the scheduler starts
    pub debug_logging: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SchedulerConfig {
    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UTHREAD_STACK_SIZE` - Stack bytes per context
    /// - `UTHREAD_TIMER_INTERVAL_MS` - Alarm period in milliseconds
    /// - `UTHREAD_SYNC_ONE_IN` - Synchronous preemption rate
    /// - `UTHREAD_READY_QUEUE_CAPACITY` - Initial ready queue capacity
    /// - `UTHREAD_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        Self {
            stack_size: env_get("UTHREAD_STACK_SIZE", defaults::STACK_SIZE),
            timer_interval: Duration::from_millis(env_get(
                "UTHREAD_TIMER_INTERVAL_MS",
                defaults::TIMER_INTERVAL_MS,
            )),
            sync_preempt_one_in: env_get("UTHREAD_SYNC_ONE_IN", defaults::SYNC_PREEMPT_ONE_IN),
            ready_queue_capacity: env_get(
                "UTHREAD_READY_QUEUE_CAPACITY",
                defaults::READY_QUEUE_CAPACITY,
            ),
            debug_logging: env_get_bool("UTHREAD_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with library defaults only (no env override).
    pub fn new() -> Self {
        Self {
            stack_size: defaults::STACK_SIZE,
            timer_interval: Duration::from_millis(defaults::TIMER_INTERVAL_MS),
            sync_preempt_one_in: defaults::SYNC_PREEMPT_ONE_IN,
            ready_queue_capacity: defaults::READY_QUEUE_CAPACITY,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn timer_interval(mut self, d: Duration) -> Self {
        self.timer_interval = d;
        self
    }

    pub fn sync_preempt_one_in(mut self, n: u32) -> Self {
        self.sync_preempt_one_in = n;
        self
    }

    pub fn ready_queue_capacity(mut self, cap: usize) -> Self {
        self.ready_queue_capacity = cap;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 64KB"));
        }
        if self.timer_interval.is_zero() {
            return Err(ConfigError::InvalidValue("timer_interval must be > 0"));
        }
        if self.sync_preempt_one_in == 0 {
            return Err(ConfigError::InvalidValue("sync_preempt_one_in must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("uthread configuration:");
        eprintln!("  stack_size:           {}", self.stack_size);
        eprintln!("  timer_interval:       {:?}", self.timer_interval);
        eprintln!("  sync_preempt_one_in:  {}", self.sync_preempt_one_in);
        eprintln!("  ready_queue_capacity: {}", self.ready_queue_capacity);
        eprintln!("  debug_logging:        {}", self.debug_logging);
    }
}

/// Which preemption sources to arm, passed to `start_preemptions`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreemptionConfig {
    /// Periodic alarm signal delivered to the scheduler thread
    pub async_timer: bool,
    /// Pseudo-random yields at interrupt enable/disable transitions
    pub sync_random: bool,
    /// Seed for the synchronous source; equal seeds replay equal schedules
    pub seed: u64,
}

impl PreemptionConfig {
    pub fn new(async_timer: bool, sync_random: bool, seed: u64) -> Self {
        Self { async_timer, sync_random, seed }
    }

    /// Alarm-driven preemption only
    pub fn asynchronous() -> Self {
        Self::new(true, false, 0)
    }

    /// Seeded synchronous preemption only
    pub fn synchronous(seed: u64) -> Self {
        Self::new(false, true, seed)
    }

    /// Neither source armed
    pub fn is_noop(&self) -> bool {
        !self.async_timer && !self.sync_random
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ThreadError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => ThreadError::InvalidConfig(msg),
        }
    }
}
