//! Contexts and the table that owns them
//!
//! A [`Context`] is one schedulable unit: its saved registers, its stack
//! and, until first run, the closure it will execute. Contexts are boxed so
//! the register block keeps a stable address while the table grows.

use crate::arch::{self, EntryFn, SavedRegs};
use crate::memory::Stack;
use uthread_core::{ContextId, ContextState, ThreadResult};

/// Body of a context, consumed on first run
pub type Entry = Box<dyn FnOnce() + 'static>;

pub struct Context {
    id: ContextId,
    state: ContextState,
    regs: SavedRegs,
    stack: Stack,
    entry: Option<Entry>,
}

impl Context {
    /// Allocate a stack and prime the registers so the first switch runs
    /// `start(id)` on it.
    pub fn new(id: ContextId, stack_size: usize, entry: Entry, start: EntryFn) -> ThreadResult<Box<Self>> {
        let stack = Stack::new(stack_size)?;
        let mut ctx = Box::new(Context {
            id,
            state: ContextState::Ready,
            regs: SavedRegs::new(),
            stack,
            entry: Some(entry),
        });
        let top = ctx.stack.top();
        unsafe { arch::init_context(&mut ctx.regs, top, start, id.as_usize()) };
        Ok(ctx)
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> ContextState {
        self.state
    }

    #[inline]
    pub fn set_state(&mut self, state: ContextState) {
        self.state = state;
    }

    #[inline]
    pub fn regs_ptr(&mut self) -> *mut SavedRegs {
        &mut self.regs
    }

    #[inline]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Hand out the body; `None` once the context has started
    pub fn take_entry(&mut self) -> Option<Entry> {
        self.entry.take()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("stack", &self.stack)
            .field("started", &self.entry.is_none())
            .finish()
    }
}

/// Id-indexed owner of every context that has not been retired
///
/// Ids are reused, but only after [`release`](Self::release): a context
/// taken out for retirement keeps its id reserved until its stack is gone.
#[derive(Debug, Default)]
pub struct ContextTable {
    slots: Vec<Option<Box<Context>>>,
    free: Vec<u32>,
    live: usize,
}

impl ContextTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id, build the context for it with `make`, store it.
    ///
    /// The id is returned to the free list if `make` fails.
    pub fn insert_with<F>(&mut self, make: F) -> ThreadResult<ContextId>
    where
        F: FnOnce(ContextId) -> ThreadResult<Box<Context>>,
    {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                (self.slots.len() - 1) as u32
            }
        };
        let id = ContextId::new(slot);
        match make(id) {
            Ok(ctx) => {
                self.slots[slot as usize] = Some(ctx);
                self.live += 1;
                Ok(id)
            }
            Err(e) => {
                self.free.push(slot);
                Err(e)
            }
        }
    }

    pub fn get(&self, id: ContextId) -> Option<&Context> {
        self.slots.get(id.as_usize()).and_then(|s| s.as_deref())
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.slots.get_mut(id.as_usize()).and_then(|s| s.as_deref_mut())
    }

    /// Remove a context but keep its id reserved
    pub fn take(&mut self, id: ContextId) -> Option<Box<Context>> {
        let ctx = self.slots.get_mut(id.as_usize()).and_then(Option::take);
        if ctx.is_some() {
            self.live -= 1;
        }
        ctx
    }

    /// Make a taken id available again
    pub fn release(&mut self, id: ContextId) {
        debug_assert!(self.get(id).is_none());
        debug_assert!(!self.free.contains(&id.as_u32()));
        self.free.push(id.as_u32());
    }

    /// Contexts currently stored
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uthread_core::{MemoryError, ThreadError};

    extern "C" fn never(_: usize) -> ! {
        std::process::abort()
    }

    fn make(id: ContextId) -> ThreadResult<Box<Context>> {
        Context::new(id, 64 * 1024, Box::new(|| {}), never)
    }

    #[test]
    fn test_new_context_is_primed() {
        let mut ctx = make(ContextId::new(3)).unwrap();
        assert_eq!(ctx.id(), ContextId::new(3));
        assert_eq!(ctx.state(), ContextState::Ready);
        let sp = unsafe { (*ctx.regs_ptr()).stack_pointer() };
        assert!(ctx.stack().contains(sp));
        assert!(ctx.take_entry().is_some());
        assert!(ctx.take_entry().is_none());
    }

    #[test]
    fn test_ids_reused_only_after_release() {
        let mut table = ContextTable::new();
        let a = table.insert_with(make).unwrap();
        let b = table.insert_with(make).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);

        let taken = table.take(a).unwrap();
        assert_eq!(table.len(), 1);
        let c = table.insert_with(make).unwrap();
        assert_ne!(c, a);

        drop(taken);
        table.release(a);
        let d = table.insert_with(make).unwrap();
        assert_eq!(d, a);
    }

    #[test]
    fn test_failed_build_returns_id() {
        let mut table = ContextTable::new();
        let err = table
            .insert_with(|_| Err(MemoryError::AllocationFailed.into()))
            .unwrap_err();
        assert_eq!(err, ThreadError::MemoryError(MemoryError::AllocationFailed));
        assert!(table.is_empty());

        let id = table.insert_with(make).unwrap();
        assert_eq!(id, ContextId::new(0));
    }
}
