//! x86_64 context switching
//!
//! Only the System V callee-saved state is kept: rsp, rbx, rbp, r12-r15, plus
//! the MXCSR and x87 control words. Everything else is clobbered by the call
//! into `context_switch` anyway.

use super::EntryFn;
use std::arch::naked_asm;

/// Default MXCSR: all exceptions masked, round-to-nearest
const MXCSR_DEFAULT: u32 = 0x1F80;
/// Default x87 control word: all exceptions masked, 64-bit precision
const FPUCW_DEFAULT: u16 = 0x037F;

/// Saved registers of a suspended context
///
/// Offsets are baked into the assembly below; do not reorder.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SavedRegs {
    pub rsp: u64,   // 0x00
    pub rip: u64,   // 0x08
    pub rbx: u64,   // 0x10
    pub rbp: u64,   // 0x18
    pub r12: u64,   // 0x20
    pub r13: u64,   // 0x28
    pub r14: u64,   // 0x30
    pub r15: u64,   // 0x38
    pub mxcsr: u32, // 0x40
    pub fpucw: u16, // 0x44
    _pad: u16,
}

impl SavedRegs {
    pub const fn new() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            mxcsr: 0,
            fpucw: 0,
            _pad: 0,
        }
    }

    #[inline]
    pub fn stack_pointer(&self) -> usize {
        self.rsp as usize
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
    // The trampoline is entered by `jmp`, so rsp must be 16-byte aligned
    // here; its `call` then leaves rsp+8 aligned at entry as the ABI wants.
    let sp = (stack_top as usize) & !0xF;

    *regs = SavedRegs::new();
    regs.rsp = sp as u64;
    regs.rip = context_trampoline as unsafe extern "C" fn() as usize as u64;
    regs.r12 = entry as usize as u64;
    regs.r13 = arg as u64;
    regs.mxcsr = MXCSR_DEFAULT;
    regs.fpucw = FPUCW_DEFAULT;
}

/// First code a fresh context runs: `r12(r13)`, never returns
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
    );
}

/// Save the running context into `old` and resume `new`.
///
/// Returns when some later switch resumes `old`.
///
/// # Safety
///
/// `new` must hold registers saved by this function or primed by
/// `init_context`, and the stack it refers to must still be mapped.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedRegs, _new: *const SavedRegs) {
    naked_asm!(
        // Save into old (rdi)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        "stmxcsr dword ptr [rdi + 0x40]",
        "fnstcw word ptr [rdi + 0x44]",
        // Load from new (rsi)
        "ldmxcsr dword ptr [rsi + 0x40]",
        "fldcw word ptr [rsi + 0x44]",
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point of a saved context
        "1:",
        "ret",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_layout_matches_asm() {
        assert_eq!(offset_of!(SavedRegs, rsp), 0x00);
        assert_eq!(offset_of!(SavedRegs, rip), 0x08);
        assert_eq!(offset_of!(SavedRegs, r15), 0x38);
        assert_eq!(offset_of!(SavedRegs, mxcsr), 0x40);
        assert_eq!(offset_of!(SavedRegs, fpucw), 0x44);
        assert_eq!(size_of::<SavedRegs>(), 0x48);
    }

    extern "C" fn never(_: usize) -> ! {
        std::process::abort()
    }

    #[test]
    fn test_init_context_aligns_stack() {
        let mut buf = vec![0u8; 4096];
        let top = unsafe { buf.as_mut_ptr().add(4096 - 3) };
        let mut regs = SavedRegs::default();
        unsafe { init_context(&mut regs, top, never, 99) };

        assert_eq!(regs.rsp % 16, 0);
        assert!(regs.stack_pointer() <= top as usize);
        assert_eq!(regs.r13, 99);
        assert_eq!(regs.rip, context_trampoline as unsafe extern "C" fn() as usize as u64);
        assert_eq!(regs.r12, never as EntryFn as usize as u64);
        assert_eq!(regs.mxcsr, MXCSR_DEFAULT);
        assert_eq!(regs.rbp, 0);
    }
}
