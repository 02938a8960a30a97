//! Per-thread cooperative scheduler
//!
//! One [`Scheduler`] runs on one OS thread and multiplexes contexts on it.
//! It is reached through a thread-local pointer (see [`crate::tls`]) because
//! every operation runs on a different stack than the one that installed it,
//! and the alarm signal handler needs it too.
//!
//! Rules every function here follows:
//!
//! - scheduler state is only mutated while interrupts are suppressed, or by
//!   whoever holds the interrupt claim
//! - no `&mut Scheduler` lives across a context switch; borrows are taken in
//!   short blocks from the raw pointer and re-derived after resuming
//! - a context parks itself (ready queue, lock waiters, condition waiters or
//!   the retired set) *before* calling [`Scheduler::dispatch`]
//!
//! # Run modes
//!
//! [`bootstrap`] turns the calling thread into a context scheduler for good:
//! when nothing is left to run the process exits with status 0.
//! [`run_hosted`] saves the caller as a host context and switches back to it
//! once nothing is left to run, so the caller gets [`RunStats`] back.

use crate::arch::{self, SavedRegs};
use crate::config::{PreemptionConfig, SchedulerConfig};
use crate::context::{Context, ContextTable, Entry};
use crate::interrupt::InterruptState;
use crate::timer::AlarmThread;
use crate::tls;
use std::convert::Infallible;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use uthread_core::kprint::{self, LogLevel};
use uthread_core::{
    Acquire, CondId, ConditionKey, ConditionTable, ContextId, ContextState, LockId, LockTable,
    ReadyQueue, RetiredSet, ThreadError, ThreadResult,
};
use uthread_core::{kdebug, kerror, kinfo, ktrace, kwarn};

/// Set once a process-mode scheduler has been started
static PROCESS_STARTED: AtomicBool = AtomicBool::new(false);

/// What happens when the ready queue runs dry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Print the exit banner and terminate the process with status 0
    Process,
    /// Switch back to the thread that started the run
    Hosted,
}

/// Counters collected over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Contexts created, the initial one included
    pub spawned: u64,
    /// Contexts whose entry function returned
    pub retired: u64,
    /// Retired contexts whose stacks have been released
    pub reclaimed: u64,
    /// Context switches performed
    pub switches: u64,
    /// Involuntary yields from either preemption source
    pub preemptions: u64,
    /// Contexts still waiting on a lock or condition when the run ended
    pub still_blocked: usize,
}

pub struct Scheduler {
    config: SchedulerConfig,
    mode: RunMode,
    contexts: ContextTable,
    current: ContextId,
    ready: ReadyQueue,
    locks: LockTable,
    conds: ConditionTable,
    retired: RetiredSet<Box<Context>>,
    /// Registers of the thread that started the run
    host: SavedRegs,
    /// Save area for switches that never resume
    scratch: SavedRegs,
    interrupts: InterruptState,
    alarm: Option<AlarmThread>,
    stats: RunStats,
}

impl Scheduler {
    fn new(config: SchedulerConfig, mode: RunMode) -> Self {
        let ready = ReadyQueue::with_capacity(config.ready_queue_capacity);
        Self {
            config,
            mode,
            contexts: ContextTable::new(),
            current: ContextId::NONE,
            ready,
            locks: LockTable::new(),
            conds: ConditionTable::new(),
            retired: RetiredSet::new(),
            host: SavedRegs::new(),
            scratch: SavedRegs::new(),
            interrupts: InterruptState::new(),
            alarm: None,
            stats: RunStats::default(),
        }
    }

    /// Box a scheduler and make it this thread's scheduler.
    fn install(config: SchedulerConfig, mode: RunMode) -> ThreadResult<*mut Scheduler> {
        config.validate()?;
        if config.debug_logging {
            if !kprint::level_enabled(LogLevel::Debug) {
                kprint::set_log_level(LogLevel::Debug);
            }
            config.print();
        }
        kdebug!(
            "scheduler starting: mode {:?}, stack {} bytes",
            mode,
            config.stack_size
        );
        let sched = Box::into_raw(Box::new(Scheduler::new(config, mode)));
        tls::set_scheduler(sched);
        Ok(sched)
    }

    /// Tear down a hosted scheduler from the host stack.
    ///
    /// # Safety
    ///
    /// `this` must come from `install` and no context may be running.
    unsafe fn uninstall(this: *mut Scheduler) -> RunStats {
        let mut sched = Box::from_raw(this);
        if let Some(alarm) = sched.alarm.take() {
            alarm.shutdown();
        }
        tls::clear_scheduler();
        kprint::clear_context_id();

        // The host runs on its own stack, so every retired stack can go now
        for (id, ctx) in sched.retired.collect(ContextId::NONE) {
            drop(ctx);
            sched.release_id(id);
        }
        sched.stats.still_blocked = sched.blocked_count();
        if !sched.contexts.is_empty() {
            kdebug!("dropping {} unfinished context(s)", sched.contexts.len());
        }
        sched.stats
    }

    /// Create the first context and switch into it.
    ///
    /// Returns only in hosted mode, once the ready queue has drained.
    unsafe fn launch(this: *mut Scheduler, entry: Entry) -> ThreadResult<()> {
        let first = (*this).create_context(entry)?;
        let popped = (*this).ready.pop();
        debug_assert_eq!(popped, Some(first));
        let host = &raw mut (*this).host;
        Self::switch_from(this, host, first);
        Ok(())
    }

    // ========================================================================
    // Bookkeeping (no switching)
    // ========================================================================

    fn create_context(&mut self, entry: Entry) -> ThreadResult<ContextId> {
        let stack_size = self.config.stack_size;
        let id = self
            .contexts
            .insert_with(|id| Context::new(id, stack_size, entry, context_main))?;
        self.ready.push(id);
        self.stats.spawned += 1;
        kdebug!("spawned context {}", id);
        Ok(id)
    }

    fn set_state(&mut self, id: ContextId, state: ContextState) {
        if let Some(ctx) = self.contexts.get_mut(id) {
            ctx.set_state(state);
        }
    }

    fn make_ready(&mut self, id: ContextId) {
        self.set_state(id, ContextState::Ready);
        self.ready.push(id);
    }

    /// Return the id of a reclaimed context to the table.
    ///
    /// An id still named as a lock holder stays reserved for the rest of
    /// the run, so no later context can pass for that holder.
    fn release_id(&mut self, id: ContextId) {
        self.stats.reclaimed += 1;
        if self.locks.holds_any(id) {
            kdebug!("context {} id pinned by a held lock", id);
            return;
        }
        self.contexts.release(id);
    }

    /// Give up `lock` on behalf of the current context, readying the next
    /// holder if someone was waiting.
    fn release(&mut self, lock: LockId) -> ThreadResult<()> {
        let me = self.current;
        if let Some(next) = self.locks.release(lock, me)? {
            ktrace!("lock {} handed to context {}", lock, next);
            self.make_ready(next);
        }
        Ok(())
    }

    fn signal_one(&mut self, key: ConditionKey) {
        if let Some(woken) = self.conds.wake_one(key) {
            ktrace!("signal {} woke context {}", key, woken);
            self.make_ready(woken);
        }
    }

    fn signal_all(&mut self, key: ConditionKey) {
        for woken in self.conds.wake_all(key) {
            ktrace!("broadcast {} woke context {}", key, woken);
            self.make_ready(woken);
        }
    }

    fn arm_preemption(&mut self, p: PreemptionConfig) -> ThreadResult<()> {
        if self.interrupts.armed() {
            return Err(ThreadError::AlreadyInitialized);
        }
        if p.async_timer {
            crate::signal::install_alarm_handler(alarm_handler)?;
            let alarm = AlarmThread::start(crate::signal::current_thread(), self.config.timer_interval)?;
            self.alarm = Some(alarm);
            self.interrupts.arm_async();
        }
        if p.sync_random {
            self.interrupts.arm_sync(p.seed, self.config.sync_preempt_one_in);
        }
        kdebug!(
            "preemption armed: async {}, sync {} (seed {})",
            p.async_timer,
            p.sync_random,
            p.seed
        );
        Ok(())
    }

    fn blocked_count(&self) -> usize {
        self.locks.blocked_count() + self.conds.blocked_count()
    }

    fn dump(&self) {
        let ready: Vec<String> = self.ready.iter().map(|id| id.to_string()).collect();
        kinfo!("current: {}", self.current);
        kinfo!("ready: [{}]", ready.join(", "));
        for (lock, holder, _) in self.locks.snapshot() {
            let holder = holder.map_or_else(|| "free".to_string(), |h| h.to_string());
            kinfo!("lock {}: holder {}, waiters {:?}", lock, holder, self.locks.waiters(lock));
        }
        for (key, _) in self.conds.snapshot() {
            kinfo!("cond {}: waiters {:?}", key, self.conds.waiters(key));
        }
    }

    // ========================================================================
    // Switching
    // ========================================================================

    /// Save the running stack into `save` and resume `next`.
    ///
    /// Returns when something later switches back into `save`.
    unsafe fn switch_from(this: *mut Scheduler, save: *mut SavedRegs, next: ContextId) {
        let load = {
            let s = &mut *this;
            s.current = next;
            s.stats.switches += 1;
            match s.contexts.get_mut(next) {
                Some(ctx) => {
                    ctx.set_state(ContextState::Running);
                    ctx.regs_ptr() as *const SavedRegs
                }
                None => {
                    kerror!("dispatch of unknown context {}", next);
                    std::process::abort();
                }
            }
        };
        kprint::set_context_id(next.as_u32());
        arch::context_switch(save, load);

        // Resumed: whoever switched here already set `current` to us
        Self::reclaim(this);
    }

    /// Run the next ready context. The caller has already parked itself.
    unsafe fn dispatch(this: *mut Scheduler) {
        let (me, next) = {
            let s = &mut *this;
            (s.current, s.ready.pop())
        };
        let next = match next {
            Some(next) => next,
            None => Self::finish(this),
        };
        if next == me {
            (*this).set_state(me, ContextState::Running);
            return;
        }
        let save = match (*this).contexts.get_mut(me) {
            Some(ctx) => ctx.regs_ptr(),
            None => {
                kerror!("running context {} missing from table", me);
                std::process::abort();
            }
        };
        Self::switch_from(this, save, next);
    }

    /// Put the current context at the back of the ready queue and dispatch.
    unsafe fn yield_inner(this: *mut Scheduler) {
        {
            let s = &mut *this;
            let me = s.current;
            s.make_ready(me);
        }
        Self::dispatch(this);
    }

    /// Release every retired stack except the one we are standing on.
    unsafe fn reclaim(this: *mut Scheduler) {
        let s = &mut *this;
        let active = s.current;
        for (id, ctx) in s.retired.collect(active) {
            drop(ctx);
            s.release_id(id);
            ktrace!("reclaimed context {}", id);
        }
    }

    /// Retire the current context and never come back to it.
    unsafe fn exit_current(this: *mut Scheduler) -> ! {
        let next = {
            let s = &mut *this;
            let me = s.current;
            match s.contexts.take(me) {
                Some(mut ctx) => {
                    ctx.set_state(ContextState::Retired);
                    s.retired.mark(me, ctx);
                }
                None => {
                    kerror!("exiting context {} missing from table", me);
                    std::process::abort();
                }
            }
            s.stats.retired += 1;
            if s.locks.holds_any(me) {
                kwarn!("context {} finished while holding a lock", me);
            }
            kdebug!("context {} finished", me);
            s.ready.pop()
        };
        match next {
            Some(next) => {
                let scratch = &raw mut (*this).scratch;
                Self::switch_from(this, scratch, next);
                kerror!("retired context resumed");
                std::process::abort();
            }
            None => Self::finish(this),
        }
    }

    /// Nothing is runnable: end the process or return to the host.
    unsafe fn finish(this: *mut Scheduler) -> ! {
        Self::reclaim(this);
        let s = &mut *this;
        let blocked = s.blocked_count();
        s.stats.still_blocked = blocked;
        if blocked > 0 {
            kwarn!("{} context(s) still blocked with nothing left to run", blocked);
        }
        match s.mode {
            RunMode::Process => {
                kprint::clear_context_id();
                println!("Thread library exiting.");
                let _ = std::io::stdout().flush();
                std::process::exit(0);
            }
            RunMode::Hosted => {
                kdebug!("ready queue drained, returning to host");
                s.current = ContextId::NONE;
                kprint::clear_context_id();
                let save = &raw mut s.scratch;
                let load = &raw const s.host;
                arch::context_switch(save, load);
                kerror!("finished scheduler resumed");
                std::process::abort();
            }
        }
    }

    // ========================================================================
    // Interrupts and preemption
    // ========================================================================

    unsafe fn interrupts_disable(this: *mut Scheduler) {
        Self::sync_point(this);
        let was = (*this).interrupts.suppress();
        debug_assert!(was, "interrupts already disabled");
    }

    unsafe fn interrupts_enable(this: *mut Scheduler) {
        let was = (*this).interrupts.unsuppress();
        debug_assert!(!was, "interrupts already enabled");
        while (*this).interrupts.take_pending() {
            Self::on_alarm(this);
        }
        Self::sync_point(this);
    }

    /// Synchronous preemption: maybe yield at an interrupt transition.
    unsafe fn sync_point(this: *mut Scheduler) {
        if !(*this).interrupts.sync_armed() || !(*this).interrupts.try_claim() {
            return;
        }
        if (*this).interrupts.roll_sync() {
            (*this).stats.preemptions += 1;
            Self::yield_inner(this);
        }
        (*this).interrupts.end_claim();
    }

    /// Asynchronous preemption, from the signal handler or a pending mark.
    unsafe fn on_alarm(this: *mut Scheduler) {
        if !(*this).interrupts.try_claim() {
            (*this).interrupts.mark_pending();
            return;
        }
        (*this).stats.preemptions += 1;
        Self::yield_inner(this);
        (*this).interrupts.end_claim();
    }

    // ========================================================================
    // Operations that may block
    // ========================================================================

    unsafe fn acquire(this: *mut Scheduler, lock: LockId) -> ThreadResult<()> {
        let queued = {
            let s = &mut *this;
            let me = s.current;
            match s.locks.acquire(lock, me)? {
                Acquire::Granted => false,
                Acquire::Queued => {
                    s.set_state(me, ContextState::BlockedOnLock);
                    true
                }
            }
        };
        if queued {
            Self::dispatch(this);
            // Ownership was handed over by the releasing context
            debug_assert_eq!((*this).locks.holder(lock), Some((*this).current));
        }
        Ok(())
    }

    unsafe fn wait(this: *mut Scheduler, lock: LockId, cond: CondId) -> ThreadResult<()> {
        {
            let s = &mut *this;
            let me = s.current;
            s.locks.check_owner(lock, me)?;
            s.release(lock)?;
            s.conds.enqueue(ConditionKey::new(lock, cond), me);
            s.set_state(me, ContextState::BlockedOnCond);
        }
        Self::dispatch(this);
        Self::acquire(this, lock)
    }
}

// ============================================================================
// Context entry and signal handler
// ============================================================================

/// First Rust frame of every context, entered from the arch trampoline
/// with interrupts suppressed.
extern "C" fn context_main(arg: usize) -> ! {
    let id = ContextId::new(arg as u32);
    let sched = match tls::scheduler_ptr() {
        Some(sched) => sched,
        None => std::process::abort(),
    };
    unsafe {
        Scheduler::reclaim(sched);
        let entry = (*sched).contexts.get_mut(id).and_then(Context::take_entry);
        Scheduler::interrupts_enable(sched);

        if let Some(entry) = entry {
            if panic::catch_unwind(AssertUnwindSafe(entry)).is_err() {
                kerror!("context {} panicked", id);
            }
        }

        Scheduler::interrupts_disable(sched);
        Scheduler::exit_current(sched)
    }
}

extern "C" fn alarm_handler(_sig: libc::c_int) {
    let errno = crate::signal::save_errno();
    if let Some(sched) = tls::scheduler_ptr() {
        unsafe { Scheduler::on_alarm(sched) };
    }
    crate::signal::restore_errno(errno);
}

// ============================================================================
// Public API
// ============================================================================

fn current_scheduler() -> ThreadResult<*mut Scheduler> {
    tls::scheduler_ptr().ok_or(ThreadError::NotInitialized)
}

/// Run `op` with interrupts suppressed around it
fn guarded<R>(op: impl FnOnce(*mut Scheduler) -> ThreadResult<R>) -> ThreadResult<R> {
    let sched = current_scheduler()?;
    unsafe { Scheduler::interrupts_disable(sched) };
    let result = op(sched);
    unsafe { Scheduler::interrupts_enable(sched) };
    result
}

/// Turn the calling thread into the process scheduler and run `entry` as
/// the first context.
///
/// Never returns on success: once no context is runnable the process
/// prints `Thread library exiting.` and exits with status 0. Callable once
/// per process.
pub fn bootstrap<F>(config: SchedulerConfig, entry: F) -> Result<Infallible, ThreadError>
where
    F: FnOnce() + 'static,
{
    if tls::is_active() {
        return Err(ThreadError::AlreadyInitialized);
    }
    config.validate()?;
    if PROCESS_STARTED.swap(true, Ordering::SeqCst) {
        return Err(ThreadError::AlreadyInitialized);
    }
    let sched = Scheduler::install(config, RunMode::Process)?;
    unsafe {
        if let Err(e) = Scheduler::launch(sched, Box::new(entry)) {
            drop(Box::from_raw(sched));
            tls::clear_scheduler();
            return Err(e);
        }
    }
    kerror!("process scheduler returned to its host");
    std::process::abort()
}

/// Run `entry` as the first context of a scheduler on the calling thread,
/// returning once no context is runnable.
///
/// Contexts still blocked at that point are dropped without running their
/// remaining code; see [`RunStats::still_blocked`].
pub fn run_hosted<F>(config: SchedulerConfig, entry: F) -> ThreadResult<RunStats>
where
    F: FnOnce() + 'static,
{
    if tls::is_active() {
        return Err(ThreadError::AlreadyInitialized);
    }
    let sched = Scheduler::install(config, RunMode::Hosted)?;
    let result = unsafe { Scheduler::launch(sched, Box::new(entry)) };
    let stats = unsafe { Scheduler::uninstall(sched) };
    result.map(|()| stats)
}

/// Create a context that runs `entry`; it goes to the back of the ready
/// queue. The caller keeps running.
pub fn spawn<F>(entry: F) -> ThreadResult<ContextId>
where
    F: FnOnce() + 'static,
{
    let entry: Entry = Box::new(entry);
    guarded(move |sched| unsafe { (*sched).create_context(entry) })
}

/// Move the current context to the back of the ready queue and run the
/// front one.
pub fn yield_now() -> ThreadResult<()> {
    guarded(|sched| {
        unsafe { Scheduler::yield_inner(sched) };
        Ok(())
    })
}

/// Acquire `lock`, blocking in FIFO order behind earlier requesters.
pub fn lock(lock: LockId) -> ThreadResult<()> {
    guarded(|sched| unsafe { Scheduler::acquire(sched, lock) })
}

/// Release `lock`, handing it straight to the longest waiter if any.
pub fn unlock(lock: LockId) -> ThreadResult<()> {
    guarded(|sched| unsafe { (*sched).release(lock) })
}

/// Atomically release `lock` and wait on `cond`; re-acquires `lock` before
/// returning.
pub fn wait(lock: LockId, cond: CondId) -> ThreadResult<()> {
    guarded(|sched| unsafe { Scheduler::wait(sched, lock, cond) })
}

/// Wake the longest waiter on `(lock, cond)`, if any.
pub fn signal(lock: LockId, cond: CondId) -> ThreadResult<()> {
    guarded(|sched| {
        unsafe { (*sched).signal_one(ConditionKey::new(lock, cond)) };
        Ok(())
    })
}

/// Wake every waiter on `(lock, cond)` in wait order.
pub fn broadcast(lock: LockId, cond: CondId) -> ThreadResult<()> {
    guarded(|sched| {
        unsafe { (*sched).signal_all(ConditionKey::new(lock, cond)) };
        Ok(())
    })
}

/// Arm the requested preemption sources for the rest of the run.
pub fn start_preemptions(config: PreemptionConfig) -> ThreadResult<()> {
    guarded(|sched| unsafe { (*sched).arm_preemption(config) })
}

/// Id of the running context; `None` outside a context
pub fn current_id() -> Option<ContextId> {
    let sched = tls::scheduler_ptr()?;
    let id = unsafe { (*sched).current };
    id.to_option()
}

/// Counters of the run in progress
pub fn stats() -> ThreadResult<RunStats> {
    guarded(|sched| unsafe {
        let s = &*sched;
        let mut stats = s.stats;
        stats.still_blocked = s.blocked_count();
        Ok(stats)
    })
}

/// Log the ready queue, lock holders and waiters at info level
pub fn debug_dump() -> ThreadResult<()> {
    guarded(|sched| {
        unsafe { (*sched).dump() };
        Ok(())
    })
}
