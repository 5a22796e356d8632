//! Sylph compiler - Native backend
//!
//! This crate lowers the Module IR through a dynamically loaded LLVM
//! shared library:
//! - `ffi`: the symbol table and the raw-pointer boundary
//! - `handles`: nominally typed wrappers for the six native object
//!   categories
//! - `lower`: the one-pass IR lowering, verification and textual
//!   serialization
//! - `toolchain`: handing the textual IR to a system compiler
//!
//! Nothing outside `ffi` touches a raw pointer.

pub mod ffi;
pub mod handles;
pub mod lower;
pub mod toolchain;

pub use ffi::LibLlvm;
pub use lower::lower_module;

/// Default location of the native library, overridable from the CLI
pub const DEFAULT_LLVM_PATH: &str = "libLLVM.so";
