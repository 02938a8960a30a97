//! Thread-local access to the scheduler
//!
//! Each OS thread runs at most one scheduler. The pointer is set for the
//! lifetime of a run and read by every public operation and by the alarm
//! signal handler, so it must stay a plain `Cell` read.

use crate::scheduler::Scheduler;
use std::cell::Cell;
use std::ptr;

thread_local! {
    static SCHEDULER: Cell<*mut Scheduler> = const { Cell::new(ptr::null_mut()) };
}

#[inline]
pub(crate) fn set_scheduler(sched: *mut Scheduler) {
    SCHEDULER.with(|cell| cell.set(sched));
}

#[inline]
pub(crate) fn clear_scheduler() {
    SCHEDULER.with(|cell| cell.set(ptr::null_mut()));
}

/// Scheduler running on this thread, if any
#[inline]
pub(crate) fn scheduler_ptr() -> Option<*mut Scheduler> {
    let p = SCHEDULER.with(|cell| cell.get());
    if p.is_null() { None } else { Some(p) }
}

/// Check if a scheduler is installed on this thread
#[inline]
pub fn is_active() -> bool {
    SCHEDULER.with(|cell| !cell.get().is_null())
}
