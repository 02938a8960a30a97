//! Scenario tests for the public API
//!
//! Panics inside a context are caught by the scheduler, so contexts record
//! what they observe and the assertions run on the host after `block_on`.

use super::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn runtime() -> Runtime {
    Runtime::new(SchedulerConfig::new().stack_size(64 * 1024)).unwrap()
}

type Log<T> = Rc<RefCell<Vec<T>>>;

fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

/// `workers` contexts, each adding 1 to a shared counter `rounds` times
/// under lock 1. Returns the counter and the order increments happened in.
fn counting_run(
    rt: &mut Runtime,
    workers: u32,
    rounds: u32,
    preemption: Option<PreemptionConfig>,
) -> (u32, Vec<u32>, RunStats) {
    let counter = Rc::new(Cell::new(0u32));
    let order: Log<u32> = log();
    let (c, o) = (counter.clone(), order.clone());

    let stats = rt
        .block_on(move || {
            if let Some(p) = preemption {
                start_preemptions(p).unwrap();
            }
            for w in 0..workers {
                let (c, o) = (c.clone(), o.clone());
                spawn(move || {
                    for _ in 0..rounds {
                        lock(1).unwrap();
                        let seen = c.get();
                        // Any library call is a potential preemption point
                        signal(1, 99).unwrap();
                        c.set(seen + 1);
                        o.borrow_mut().push(w);
                        unlock(1).unwrap();
                    }
                })
                .unwrap();
            }
        })
        .unwrap();

    let order = order.borrow().clone();
    (counter.get(), order, stats)
}

#[test]
fn test_three_counters_reach_300_cooperatively() {
    let (count, order, stats) = counting_run(&mut runtime(), 3, 100, None);

    assert_eq!(count, 300);
    assert_eq!(order.len(), 300);
    assert_eq!(stats.spawned, 4);
    assert_eq!(stats.retired, 4);
    assert_eq!(stats.reclaimed, 4);
    assert_eq!(stats.preemptions, 0);
    assert_eq!(stats.still_blocked, 0);
}

#[test]
fn test_counters_with_lock_held_across_yield() {
    let counter = Rc::new(Cell::new(0u32));
    let c = counter.clone();

    runtime()
        .block_on(move || {
            for _ in 0..3 {
                let c = c.clone();
                spawn(move || {
                    for _ in 0..100 {
                        lock(1).unwrap();
                        let seen = c.get();
                        yield_now().unwrap();
                        c.set(seen + 1);
                        unlock(1).unwrap();
                    }
                })
                .unwrap();
            }
        })
        .unwrap();

    assert_eq!(counter.get(), 300);
}

#[test]
fn test_wait_releases_and_reacquires() {
    let events: Log<String> = log();
    let ev = events.clone();

    let stats = runtime()
        .block_on(move || {
            lock(1).unwrap();
            ev.borrow_mut().push("A locked".into());

            let evb = ev.clone();
            spawn(move || {
                // A's wait released the lock, so this succeeds
                lock(1).unwrap();
                evb.borrow_mut().push("B locked".into());
                broadcast(1, 1).unwrap();
                evb.borrow_mut().push("B broadcast".into());
                // A is runnable now but blocks behind B on the lock
                yield_now().unwrap();
                evb.borrow_mut().push("B unlocking".into());
                unlock(1).unwrap();
            })
            .unwrap();

            wait(1, 1).unwrap();
            ev.borrow_mut().push("A woke".into());
            // wait returned with the lock held
            let released = unlock(1);
            ev.borrow_mut().push(format!("A unlock {:?}", released));
        })
        .unwrap();

    assert_eq!(
        *events.borrow(),
        vec!["A locked", "B locked", "B broadcast", "B unlocking", "A woke", "A unlock Ok(())"]
    );
    assert_eq!(stats.still_blocked, 0);
}

#[test]
fn test_round_robin_fairness() {
    let trace: Log<char> = log();
    let t = trace.clone();

    runtime()
        .block_on(move || {
            for name in ['a', 'b', 'c'] {
                let t = t.clone();
                spawn(move || {
                    for _ in 0..3 {
                        t.borrow_mut().push(name);
                        yield_now().unwrap();
                    }
                })
                .unwrap();
            }
        })
        .unwrap();

    let trace: String = trace.borrow().iter().collect();
    assert_eq!(trace, "abcabcabc");
}

#[test]
fn test_yield_alone_returns_immediately() {
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    let stats = runtime()
        .block_on(move || {
            for _ in 0..10 {
                yield_now().unwrap();
                h.set(h.get() + 1);
            }
        })
        .unwrap();
    assert_eq!(hits.get(), 10);
    assert_eq!(stats.switches, 1);
}

#[test]
fn test_lock_handoff_is_fifo() {
    let order: Log<u32> = log();
    let o = order.clone();

    runtime()
        .block_on(move || {
            lock(4).unwrap();
            for i in 0..4 {
                let o = o.clone();
                spawn(move || {
                    lock(4).unwrap();
                    o.borrow_mut().push(i);
                    unlock(4).unwrap();
                })
                .unwrap();
            }
            // Let every contender queue up on the lock
            yield_now().unwrap();
            unlock(4).unwrap();
        })
        .unwrap();

    assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn test_signal_wakes_exactly_one() {
    let woken: Log<u32> = log();
    let noop = Rc::new(Cell::new(None));
    let (w, n) = (woken.clone(), noop.clone());

    let stats = runtime()
        .block_on(move || {
            n.set(Some(signal(1, 5)));
            for i in 0..3 {
                let w = w.clone();
                spawn(move || {
                    lock(1).unwrap();
                    wait(1, 5).unwrap();
                    w.borrow_mut().push(i);
                    unlock(1).unwrap();
                })
                .unwrap();
            }
            yield_now().unwrap();

            lock(1).unwrap();
            signal(1, 5).unwrap();
            unlock(1).unwrap();
        })
        .unwrap();

    assert_eq!(noop.take(), Some(Ok(())));
    assert_eq!(*woken.borrow(), vec![0]);
    assert_eq!(stats.still_blocked, 2);
    assert_eq!(stats.retired, 2);
}

#[test]
fn test_broadcast_wakes_all_in_order() {
    let woken: Log<u32> = log();
    let w = woken.clone();

    let stats = runtime()
        .block_on(move || {
            for i in 0..4 {
                let w = w.clone();
                spawn(move || {
                    lock(2).unwrap();
                    wait(2, 1).unwrap();
                    w.borrow_mut().push(i);
                    unlock(2).unwrap();
                })
                .unwrap();
            }
            yield_now().unwrap();

            lock(2).unwrap();
            broadcast(2, 1).unwrap();
            // Waiters on another condition of the same lock stay put
            broadcast(2, 2).unwrap();
            unlock(2).unwrap();
        })
        .unwrap();

    assert_eq!(*woken.borrow(), vec![0, 1, 2, 3]);
    assert_eq!(stats.still_blocked, 0);
}

#[test]
fn test_ownership_errors_leave_state_unchanged() {
    let results: Log<(String, ThreadResult<()>)> = log();
    let r = results.clone();

    runtime()
        .block_on(move || {
            let rec = |name: &str, res: ThreadResult<()>| r.borrow_mut().push((name.to_string(), res));

            rec("unlock unheld", unlock(9));
            rec("wait unheld", wait(9, 1));
            rec("lock", lock(1));
            rec("lock again", lock(1));

            let r2 = r.clone();
            spawn(move || {
                r2.borrow_mut().push(("other unlock".into(), unlock(1)));
                r2.borrow_mut().push(("other wait".into(), wait(1, 1)));
            })
            .unwrap();
            yield_now().unwrap();

            // Still the holder after all of the above
            rec("unlock", unlock(1));
        })
        .unwrap();

    let results = results.borrow();
    let expected = vec![
        ("unlock unheld", Err(ThreadError::LockNotHeld(9))),
        ("wait unheld", Err(ThreadError::LockNotHeld(9))),
        ("lock", Ok(())),
        ("lock again", Err(ThreadError::AlreadyHeld(1))),
        ("other unlock", Err(ThreadError::NotOwner(1))),
        ("other wait", Err(ThreadError::NotOwner(1))),
        ("unlock", Ok(())),
    ];
    assert_eq!(results.len(), expected.len());
    for ((name, res), (want_name, want)) in results.iter().zip(expected) {
        assert_eq!(name.as_str(), want_name);
        assert_eq!(res, &want, "{}", name);
    }
    assert_eq!(ThreadError::NotOwner(1).class(), ErrorClass::Ownership);
}

#[test]
fn test_calls_outside_a_context_fail() {
    assert_eq!(yield_now(), Err(ThreadError::NotInitialized));
    assert_eq!(lock(1), Err(ThreadError::NotInitialized));
    assert_eq!(unlock(1), Err(ThreadError::NotInitialized));
    assert_eq!(wait(1, 1), Err(ThreadError::NotInitialized));
    assert_eq!(signal(1, 1), Err(ThreadError::NotInitialized));
    assert_eq!(broadcast(1, 1), Err(ThreadError::NotInitialized));
    assert_eq!(
        start_preemptions(PreemptionConfig::synchronous(1)),
        Err(ThreadError::NotInitialized)
    );
    assert_eq!(debug_dump(), Err(ThreadError::NotInitialized));
    assert!(spawn(|| {}).is_err());
    assert!(!is_in_context());
    assert_eq!(ThreadError::NotInitialized.class(), ErrorClass::Sequencing);
}

#[test]
fn test_second_start_is_rejected() {
    let results: Log<ThreadError> = log();
    let r = results.clone();

    runtime()
        .block_on(move || {
            if let Err(e) = runtime().block_on(|| {}) {
                r.borrow_mut().push(e);
            }
            let Err(e) = bootstrap(|| {});
            r.borrow_mut().push(e);
            start_preemptions(PreemptionConfig::synchronous(3)).unwrap();
            if let Err(e) = start_preemptions(PreemptionConfig::asynchronous()) {
                r.borrow_mut().push(e);
            }
        })
        .unwrap();

    assert_eq!(*results.borrow(), vec![ThreadError::AlreadyInitialized; 3]);
}

#[test]
fn test_seeded_preemption_keeps_mutual_exclusion() {
    let p = PreemptionConfig::synchronous(0xDEC0DE);
    let (count, order, stats) = counting_run(&mut runtime(), 3, 100, Some(p));

    assert_eq!(count, 300);
    assert!(stats.preemptions > 0);
    // Preemption actually interleaved the workers
    assert!(order.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn test_same_seed_replays_same_schedule() {
    let p = PreemptionConfig::synchronous(42);
    let (_, first, a) = counting_run(&mut runtime(), 3, 50, Some(p));
    let (_, second, b) = counting_run(&mut runtime(), 3, 50, Some(p));

    assert_eq!(first, second);
    assert_eq!(a.preemptions, b.preemptions);
    assert_eq!(a.switches, b.switches);
}

#[test]
fn test_timer_preempts_a_spinning_context() {
    let config = SchedulerConfig::new()
        .stack_size(64 * 1024)
        .timer_interval(Duration::from_millis(1));
    let flag = Rc::new(AtomicBool::new(false));
    let saw_flag = Rc::new(Cell::new(false));
    let (f, s) = (flag.clone(), saw_flag.clone());

    let stats = Runtime::new(config)
        .unwrap()
        .block_on(move || {
            start_preemptions(PreemptionConfig::asynchronous()).unwrap();
            let f2 = f.clone();
            spawn(move || f2.store(true, Ordering::Release)).unwrap();

            // Never yields; only the alarm can let the other context run
            let deadline = Instant::now() + Duration::from_secs(10);
            while !f.load(Ordering::Acquire) && Instant::now() < deadline {
                std::hint::spin_loop();
            }
            s.set(f.load(Ordering::Acquire));
        })
        .unwrap();

    assert!(saw_flag.get());
    assert!(stats.preemptions >= 1);
}

#[test]
fn test_timer_preemption_keeps_mutual_exclusion() {
    let config = SchedulerConfig::new()
        .stack_size(64 * 1024)
        .timer_interval(Duration::from_millis(1));
    let mut rt = Runtime::new(config).unwrap();
    let (count, _, stats) = counting_run(&mut rt, 3, 100, Some(PreemptionConfig::asynchronous()));

    assert_eq!(count, 300);
    assert_eq!(stats.retired, stats.reclaimed);
}

#[test]
fn test_every_retired_context_is_reclaimed() {
    fn chain(left: u32, ids: Log<ContextId>) {
        if let Some(id) = current_id() {
            ids.borrow_mut().push(id);
        }
        if left > 0 {
            spawn(move || chain(left - 1, ids)).unwrap();
        }
    }

    let ids: Log<ContextId> = log();
    let i = ids.clone();
    let stats = runtime().block_on(move || chain(50, i)).unwrap();

    assert_eq!(stats.spawned, 51);
    assert_eq!(stats.retired, 51);
    assert_eq!(stats.reclaimed, 51);
    // Each stack is released right after the next switch, so ids recycle
    assert_eq!(ids.borrow().len(), 51);
    assert!(ids.borrow().iter().all(|id| id.as_u32() < 3));
}

#[test]
fn test_id_of_exited_lock_holder_is_not_reused() {
    let ids: Log<ContextId> = log();
    let results: Log<ThreadResult<()>> = log();
    let (i, r) = (ids.clone(), results.clone());

    let stats = runtime()
        .block_on(move || {
            let a_ids = i.clone();
            spawn(move || {
                lock(1).unwrap();
                a_ids.borrow_mut().extend(current_id());
                // Returns still holding lock 1
            })
            .unwrap();
            yield_now().unwrap();

            spawn(move || {
                i.borrow_mut().extend(current_id());
                r.borrow_mut().push(unlock(1));
                r.borrow_mut().push(signal(1, 1));
                // Blocks behind the dead holder for good
                let res = lock(1);
                r.borrow_mut().push(res);
            })
            .unwrap();
        })
        .unwrap();

    let ids = ids.borrow();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(*results.borrow(), vec![Err(ThreadError::NotOwner(1)), Ok(())]);
    assert_eq!(stats.retired, 2);
    assert_eq!(stats.still_blocked, 1);
}

#[test]
fn test_panicking_context_is_contained() {
    let after = Rc::new(Cell::new(false));
    let a = after.clone();

    let stats = runtime()
        .block_on(move || {
            spawn(|| panic!("boom")).unwrap();
            yield_now().unwrap();
            a.set(true);
        })
        .unwrap();

    assert!(after.get());
    assert_eq!(stats.retired, 2);
    assert_eq!(stats.reclaimed, 2);
}

#[test]
fn test_deadlock_returns_to_host() {
    let stats = runtime()
        .block_on(|| {
            lock(1).unwrap();
            // Nobody will ever signal this
            let _ = wait(1, 2);
        })
        .unwrap();

    assert_eq!(stats.retired, 0);
    assert_eq!(stats.still_blocked, 1);
}

#[test]
fn test_stats_and_dump_inside_a_run() {
    let seen = Rc::new(Cell::new(None));
    let s = seen.clone();

    runtime()
        .block_on(move || {
            spawn(|| {}).unwrap();
            lock(3).unwrap();
            debug_dump().unwrap();
            s.set(Some((stats().unwrap(), is_in_context())));
            unlock(3).unwrap();
        })
        .unwrap();

    let (stats, inside) = seen.get().unwrap();
    assert!(inside);
    assert_eq!(stats.spawned, 2);
    assert_eq!(stats.retired, 0);
}

#[test]
fn test_runtimes_on_separate_threads_are_independent() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let (count, _, stats) = counting_run(&mut runtime(), 3, 100, None);
                (count, stats.spawned)
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), (300, 4));
    }
}

#[test]
fn test_invalid_config_rejected() {
    let err = Runtime::new(SchedulerConfig::new().stack_size(1024)).unwrap_err();
    assert_eq!(err, ConfigError::InvalidValue("stack_size must be >= 64KB"));
}
