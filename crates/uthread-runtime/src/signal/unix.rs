//! Unix signal handling for SIGALRM preemption

use nix::errno::Errno;
use nix::sys::pthread::{pthread_kill, pthread_self, Pthread};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use uthread_core::error::{ThreadError, ThreadResult};

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Handle that identifies an OS thread as a signal target
pub type ThreadHandle = Pthread;

/// Install the process-wide SIGALRM handler.
///
/// Returns `true` if this call installed `handler`, `false` if a handler
/// was already in place.
///
/// `SA_NODEFER` keeps SIGALRM unblocked inside the handler: the handler may
/// switch to another context and never return on this stack until much
/// later, and later alarms must still get through meanwhile. `SA_RESTART`
/// keeps syscalls in user code from failing with EINTR.
pub fn install_alarm_handler(handler: extern "C" fn(libc::c_int)) -> ThreadResult<bool> {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    let action = SigAction::new(
        SigHandler::Handler(handler),
        SaFlags::SA_RESTART | SaFlags::SA_NODEFER,
        SigSet::empty(),
    );
    if let Err(e) = unsafe { sigaction(Signal::SIGALRM, &action) } {
        HANDLER_INSTALLED.store(false, Ordering::SeqCst);
        return Err(platform_error(e));
    }
    Ok(true)
}

/// Send SIGALRM to `thread`
pub fn send_alarm(thread: ThreadHandle) -> ThreadResult<()> {
    pthread_kill(thread, Signal::SIGALRM).map_err(platform_error)
}

/// Handle of the calling OS thread
pub fn current_thread() -> ThreadHandle {
    pthread_self()
}

/// Current thread's errno, for handlers that must leave it untouched
#[inline]
pub fn save_errno() -> i32 {
    Errno::last_raw()
}

#[inline]
pub fn restore_errno(value: i32) {
    Errno::set_raw(value);
}

fn platform_error(e: Errno) -> ThreadError {
    ThreadError::PlatformError(e as i32)
}
