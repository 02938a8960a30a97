//! Context stacks
//!
//! Every context owns one [`Stack`]: a private anonymous mapping whose
//! lowest page is left inaccessible, so running off the end faults instead
//! of silently corrupting a neighbour. Dropping the stack unmaps it.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::page_size;
    }
}

/// Stack memory of one context
///
/// ```text
///  base                 base + guard                     top
///   | guard (PROT_NONE) |      usable (grows downwards) <- |
/// ```
pub struct Stack {
    /// Start of the whole mapping (guard page included)
    base: *mut u8,
    /// Bytes mapped, guard included
    mapped: usize,
    /// Bytes of the guard region
    guard: usize,
}

impl Stack {
    /// Lowest usable address
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        unsafe { self.base.add(self.guard) }
    }

    /// One past the highest usable address; initial stack pointer
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.mapped) }
    }

    /// Usable bytes, guard excluded
    #[inline]
    pub fn size(&self) -> usize {
        self.mapped - self.guard
    }

    /// Whether `addr` lies in the usable part of this stack
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() as usize && addr <= self.top() as usize
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("top", &self.top())
            .field("size", &self.size())
            .finish()
    }
}
