//! Architecture-specific context switching
//!
//! Each backend exports the same three items:
//! - `SavedRegs` - callee-saved register block of a suspended context
//! - `init_context` - prime a block so the first switch enters `entry(arg)`
//! - `context_switch` - save into one block, resume from another

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use self::x86_64::{context_switch, init_context, SavedRegs};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use self::aarch64::{context_switch, init_context, SavedRegs};
    }
}

/// Entry point of a fresh context. Receives the argument given to
/// `init_context` and must never return.
pub type EntryFn = extern "C" fn(usize) -> !;
