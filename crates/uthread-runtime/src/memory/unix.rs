//! Unix stack allocation using mmap

use super::Stack;
use uthread_core::error::{MemoryError, ThreadResult};
use uthread_core::constants::GUARD_SIZE;
use uthread_core::kwarn;
use std::sync::OnceLock;

/// System page size, cached after the first query
pub fn page_size() -> usize {
    static PAGE: OnceLock<usize> = OnceLock::new();
    *PAGE.get_or_init(|| {
        let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if sz > 0 { sz as usize } else { GUARD_SIZE }
    })
}

impl Stack {
    /// Map a stack with at least `size` usable bytes plus a guard page.
    pub fn new(size: usize) -> ThreadResult<Self> {
        if size == 0 {
            return Err(MemoryError::InvalidSize.into());
        }
        let page = page_size();
        let guard = GUARD_SIZE.max(page);
        let usable = size
            .checked_add(page - 1)
            .map(|s| s & !(page - 1))
            .ok_or(MemoryError::InvalidSize)?;
        let mapped = usable.checked_add(guard).ok_or(MemoryError::InvalidSize)?;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed.into());
        }

        // Guard at the low end: stacks grow down into it
        let ret = unsafe { libc::mprotect(base, guard, libc::PROT_NONE) };
        if ret != 0 {
            unsafe { libc::munmap(base, mapped) };
            return Err(MemoryError::ProtectionFailed.into());
        }

        Ok(Stack {
            base: base as *mut u8,
            mapped,
            guard,
        })
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.base as *mut libc::c_void, self.mapped) };
        if ret != 0 {
            kwarn!("munmap of stack at {:p} failed", self.base);
        }
    }
}
