//! Sylph compiler - Interpreter
//!
//! Executes a Module IR directly against an in-process virtual
//! environment (stack frames, heap cells). No native object is ever
//! constructed here; the interpreter's sole obligation is semantic
//! parity with the native backend on every well-formed module.

mod interpreter;

pub use interpreter::{run, ExecutionOutcome, ExternCall, RtValue};
