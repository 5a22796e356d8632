//! Common identifiers used throughout the compiler
//!
//! Identifier aliases shared by the IR, the module builder, the native
//! backend and the interpreter.

/// Temporary value identifier for IR
///
/// A `TempId` names the value produced at one program point: an
/// instruction result or a function parameter. Temps are numbered per
/// function, parameters first.
pub type TempId = u32;

/// Basic block identifier
///
/// Blocks are numbered per function in insertion order; the block with
/// the lowest id in a function is its entry block.
pub type LabelId = u32;
