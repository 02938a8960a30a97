//! Deli counter simulation
//!
//! One cashier context per order file posts sandwich orders to a shared
//! board with room for `max_orders` orders; a single maker context waits
//! until the board is as full as it can get, then makes the order closest
//! to the sandwich it made last.
//!
//! ```text
//! deli <max_orders> <orders_file>...
//! ```
//!
//! # Environment Variables
//!
//! - `DELI_PREEMPT_SEED=<n>` - Enable seeded synchronous preemption
//! - `DELI_PREEMPT_TIMER=1` - Enable alarm-driven preemption
//! - `UTHREAD_LOG_LEVEL=debug` - Scheduler logging on stderr

use std::cell::RefCell;
use std::collections::VecDeque;
use std::process;
use std::rc::Rc;
use uthread::{
    bootstrap, broadcast, env_get_bool, env_get_opt, lock, signal, spawn, start_preemptions, unlock,
    wait, CondId, LockId, PreemptionConfig, ThreadResult,
};
use uthread::{kdebug, kerror};

const BOARD_LOCK: LockId = 1;
const PRINT_LOCK: LockId = 2;
/// A slot on the board opened up
const SLOT_FREED: CondId = 1;
/// An order was posted
const ORDER_ADDED: CondId = 2;

/// Distance baseline larger than any sandwich number
const NO_ORDER: i32 = 2001;
const FREE: i32 = -1;

/// Shared board, only touched while `BOARD_LOCK` is held
#[derive(Debug)]
struct Board {
    /// Posted sandwich per cashier, `FREE` when none
    slots: Vec<i32>,
    /// Cashier has posted its last order
    done: Vec<bool>,
    max_orders: usize,
    posted: usize,
    live_cashiers: usize,
}

impl Board {
    fn new(cashiers: usize, max_orders: usize) -> Self {
        Self {
            slots: vec![FREE; cashiers],
            done: vec![false; cashiers],
            max_orders,
            posted: 0,
            live_cashiers: cashiers,
        }
    }

    /// A cashier must hold off while its previous order is unmade or the
    /// board is full.
    fn cashier_must_wait(&self, cashier: usize) -> bool {
        self.slots[cashier] >= 0 || self.posted == self.max_orders
    }

    fn post(&mut self, cashier: usize, sandwich: i32, last: bool) {
        self.slots[cashier] = sandwich;
        self.posted += 1;
        if last {
            self.done[cashier] = true;
        }
    }

    /// A cashier with no orders at all leaves without posting
    fn leave_empty(&mut self, cashier: usize) {
        self.done[cashier] = true;
        self.live_cashiers -= 1;
    }

    fn finished(&self) -> bool {
        self.posted == 0 && self.live_cashiers == 0
    }

    /// The maker waits until the board holds as many orders as it can:
    /// one per live cashier, capped by the board size.
    fn maker_must_wait(&self) -> bool {
        self.posted < self.max_orders.min(self.live_cashiers)
    }

    /// Remove the posted order closest to `last`; ties go to the lowest
    /// cashier number.
    fn take_closest(&mut self, last: i32) -> (usize, i32) {
        let mut cashier = 0;
        let mut closest = NO_ORDER;
        for (i, &slot) in self.slots.iter().enumerate() {
            if slot >= 0 && (last - slot).abs() < (last - closest).abs() {
                cashier = i;
                closest = slot;
            }
        }
        if self.done[cashier] {
            self.live_cashiers -= 1;
        }
        self.slots[cashier] = FREE;
        self.posted -= 1;
        (cashier, closest)
    }
}

type SharedBoard = Rc<RefCell<Board>>;

/// Integers up to the first token that is not one
fn parse_orders(text: &str) -> VecDeque<i32> {
    text.split_whitespace().map_while(|tok| tok.parse().ok()).collect()
}

fn say(line: String) -> ThreadResult<()> {
    lock(PRINT_LOCK)?;
    println!("{}", line);
    unlock(PRINT_LOCK)
}

fn cashier(board: SharedBoard, me: usize, path: String) -> ThreadResult<()> {
    let mut orders = match std::fs::read_to_string(&path) {
        Ok(text) => parse_orders(&text),
        Err(e) => {
            kerror!("cashier {}: cannot read {}: {}", me, path, e);
            VecDeque::new()
        }
    };

    if orders.is_empty() {
        lock(BOARD_LOCK)?;
        board.borrow_mut().leave_empty(me);
        signal(BOARD_LOCK, ORDER_ADDED)?;
        return unlock(BOARD_LOCK);
    }

    while let Some(sandwich) = orders.pop_front() {
        lock(BOARD_LOCK)?;
        while board.borrow().cashier_must_wait(me) {
            wait(BOARD_LOCK, SLOT_FREED)?;
        }
        board.borrow_mut().post(me, sandwich, orders.is_empty());
        say(format!("POSTED: cashier {} sandwich {}", me, sandwich))?;
        signal(BOARD_LOCK, ORDER_ADDED)?;
        unlock(BOARD_LOCK)?;
    }
    kdebug!("cashier {} done", me);
    Ok(())
}

fn maker(board: SharedBoard, files: Vec<String>) -> ThreadResult<()> {
    if let Some(seed) = env_get_opt::<u64>("DELI_PREEMPT_SEED") {
        start_preemptions(PreemptionConfig::new(
            env_get_bool("DELI_PREEMPT_TIMER", false),
            true,
            seed,
        ))?;
    } else if env_get_bool("DELI_PREEMPT_TIMER", false) {
        start_preemptions(PreemptionConfig::asynchronous())?;
    }

    for (i, path) in files.into_iter().enumerate() {
        let board = board.clone();
        spawn(move || {
            if let Err(e) = cashier(board, i, path) {
                kerror!("cashier {} failed: {}", i, e);
            }
        })?;
    }

    let mut last = FREE;
    loop {
        lock(BOARD_LOCK)?;
        while !board.borrow().finished() && board.borrow().maker_must_wait() {
            wait(BOARD_LOCK, ORDER_ADDED)?;
        }
        if board.borrow().finished() {
            unlock(BOARD_LOCK)?;
            break;
        }
        let (cashier, sandwich) = board.borrow_mut().take_closest(last);
        last = sandwich;
        broadcast(BOARD_LOCK, SLOT_FREED)?;
        say(format!("READY: cashier {} sandwich {}", cashier, sandwich))?;
        unlock(BOARD_LOCK)?;
    }
    kdebug!("maker done");
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <max_orders> <orders_file>...", args[0]);
        process::exit(2);
    }
    let max_orders = match args[1].parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("deli: max_orders must be a positive integer, got {:?}", args[1]);
            process::exit(2);
        }
    };
    let files: Vec<String> = args[2..].to_vec();
    let board = Rc::new(RefCell::new(Board::new(files.len(), max_orders)));

    let Err(e) = bootstrap(move || {
        if let Err(e) = maker(board, files) {
            kerror!("maker failed: {}", e);
        }
    });
    eprintln!("deli: {}", e);
    process::exit(1);
}
