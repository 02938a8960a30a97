//! Alarm thread for asynchronous preemption
//!
//! A helper OS thread sleeps for the configured interval and then sends
//! SIGALRM to the scheduler thread it was started for. It only ever signals
//! that one thread, so several schedulers on different OS threads each get
//! their own alarm stream.

use crate::signal::{self, ThreadHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uthread_core::error::{ThreadError, ThreadResult};
use uthread_core::{kdebug, kwarn};

pub struct AlarmThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl AlarmThread {
    /// Start signalling `target` every `interval`
    pub fn start(target: ThreadHandle, interval: Duration) -> ThreadResult<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("uthread-alarm".to_string())
            .spawn(move || alarm_loop(target, interval, stop))
            .map_err(|e| ThreadError::PlatformError(e.raw_os_error().unwrap_or(0)))?;

        kdebug!("alarm thread started, interval {:?}", interval);
        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Stop the alarm and wait for the thread to exit
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for AlarmThread {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn alarm_loop(target: ThreadHandle, interval: Duration, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Acquire) {
        thread::park_timeout(interval);
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        if let Err(e) = signal::send_alarm(target) {
            kwarn!("alarm delivery failed: {}", e);
            break;
        }
    }
}
