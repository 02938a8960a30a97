//! Signal handling for asynchronous preemption
//!
//! Uses SIGALRM, delivered to the scheduler's own OS thread by the alarm
//! thread in [`crate::timer`].

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}
