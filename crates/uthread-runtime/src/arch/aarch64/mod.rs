//! aarch64 context switching
//!
//! AAPCS64 callee-saved state: sp, x19-x28, fp (x29), lr (x30) and the low
//! halves of v8-v15. A switch resumes by returning through the saved lr.

use super::EntryFn;
use std::arch::naked_asm;

/// Saved registers of a suspended context
///
/// Offsets are baked into the assembly below; do not reorder.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SavedRegs {
    pub sp: u64,           // 0x00
    pub x19: u64,          // 0x08
    pub x20: u64,          // 0x10
    pub x21_x28: [u64; 8], // 0x18
    pub fp: u64,           // 0x58
    pub lr: u64,           // 0x60
    pub d8_d15: [u64; 8],  // 0x68
}

impl SavedRegs {
    pub const fn new() -> Self {
        Self {
            sp: 0,
            x19: 0,
            x20: 0,
            x21_x28: [0; 8],
            fp: 0,
            lr: 0,
            d8_d15: [0; 8],
        }
    }

    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

/// Prime `regs` so that switching to it runs `entry(arg)` on the stack
/// ending at `stack_top`.
///
/// # Safety
///
/// `stack_top` must be the one-past-the-end address of a writable stack
/// that outlives the context.
#[inline]
pub unsafe fn init_context(regs: &mut SavedRegs, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    let sp = (stack_top as usize) & !0xF;

    *regs = SavedRegs::new();
    regs.sp = sp as u64;
    regs.lr = context_trampoline as unsafe extern "C" fn() as usize as u64;
    regs.x19 = entry as usize as u64;
    regs.x20 = arg as u64;
}

/// First code a fresh context runs: `x19(x20)`, never returns
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "brk #1",
    );
}

/// Save the running context into `old` and resume `new`.
///
/// # Safety
///
/// `new` must hold registers saved by this function or primed by
/// `init_context`, and the stack it refers to must still be mapped.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedRegs, _new: *const SavedRegs) {
    naked_asm!(
        // Save into old (x0)
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "stp x19, x20, [x0, #0x08]",
        "stp x21, x22, [x0, #0x18]",
        "stp x23, x24, [x0, #0x28]",
        "stp x25, x26, [x0, #0x38]",
        "stp x27, x28, [x0, #0x48]",
        "stp x29, x30, [x0, #0x58]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        // Load from new (x1)
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldp x19, x20, [x1, #0x08]",
        "ldp x21, x22, [x1, #0x18]",
        "ldp x23, x24, [x1, #0x28]",
        "ldp x25, x26, [x1, #0x38]",
        "ldp x27, x28, [x1, #0x48]",
        "ldp x29, x30, [x1, #0x58]",
        "ldp d8, d9, [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        "ret",
    );
}
