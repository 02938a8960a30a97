//! Interrupt suppression state
//!
//! Scheduler state may only be touched while interrupts are suppressed.
//! The flag is atomic because the alarm signal handler reads it on the
//! same thread at arbitrary points:
//!
//! - a handler that finds interrupts enabled *claims* them (true -> false)
//!   and may preempt
//! - a handler that finds them suppressed leaves a *pending* mark, which is
//!   delivered the next time they are enabled
//!
//! The synchronous source is stepped only by whoever holds the claim.

use std::sync::atomic::{AtomicBool, Ordering};
use uthread_core::SeededRng;

#[derive(Debug)]
struct SyncSource {
    rng: SeededRng,
    one_in: u32,
}

#[derive(Debug)]
pub struct InterruptState {
    enabled: AtomicBool,
    pending: AtomicBool,
    sync: Option<SyncSource>,
    async_armed: bool,
}

impl Default for InterruptState {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptState {
    /// Starts suppressed; the first context enables on entry.
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            sync: None,
            async_armed: false,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Suppress; returns whether interrupts were enabled before.
    #[inline]
    pub fn suppress(&self) -> bool {
        self.enabled.swap(false, Ordering::SeqCst)
    }

    /// Enable; returns whether interrupts were enabled before.
    #[inline]
    pub fn unsuppress(&self) -> bool {
        self.enabled.swap(true, Ordering::SeqCst)
    }

    /// Take the enabled flag if it is set. Only the winner may preempt.
    #[inline]
    pub fn try_claim(&self) -> bool {
        self.enabled
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Give back a successful claim
    #[inline]
    pub fn end_claim(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn mark_pending(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    pub fn arm_sync(&mut self, seed: u64, one_in: u32) {
        self.sync = Some(SyncSource {
            rng: SeededRng::new(seed),
            one_in,
        });
    }

    #[inline]
    pub fn sync_armed(&self) -> bool {
        self.sync.is_some()
    }

    /// Step the synchronous source; true means preempt now.
    #[inline]
    pub fn roll_sync(&mut self) -> bool {
        match &mut self.sync {
            Some(src) => src.rng.one_in(src.one_in),
            None => false,
        }
    }

    pub fn arm_async(&mut self) {
        self.async_armed = true;
    }

    #[inline]
    pub fn async_armed(&self) -> bool {
        self.async_armed
    }

    /// Either source already armed
    pub fn armed(&self) -> bool {
        self.async_armed || self.sync.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_suppressed() {
        let st = InterruptState::new();
        assert!(!st.is_enabled());
        assert!(!st.try_claim());
        assert!(!st.armed());
    }

    #[test]
    fn test_claim_excludes_second_claimer() {
        let st = InterruptState::new();
        assert!(!st.unsuppress());
        assert!(st.try_claim());
        assert!(!st.try_claim());
        st.end_claim();
        assert!(st.is_enabled());
        assert!(st.suppress());
    }

    #[test]
    fn test_pending_is_taken_once() {
        let st = InterruptState::new();
        st.mark_pending();
        assert!(st.take_pending());
        assert!(!st.take_pending());
    }

    #[test]
    fn test_sync_rolls_replay_for_same_seed() {
        let mut a = InterruptState::new();
        let mut b = InterruptState::new();
        assert!(!a.roll_sync());
        a.arm_sync(11, 3);
        b.arm_sync(11, 3);
        let ra: Vec<bool> = (0..64).map(|_| a.roll_sync()).collect();
        let rb: Vec<bool> = (0..64).map(|_| b.roll_sync()).collect();
        assert_eq!(ra, rb);
        assert!(ra.iter().any(|&x| x));
        assert!(a.sync_armed() && a.armed());
    }
}
