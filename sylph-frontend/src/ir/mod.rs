//! Module IR - the shared intermediate representation
//!
//! This module defines the backend-agnostic typed IR that both the
//! native backend and the interpreter consume. It is pure data: no
//! native object is referenced anywhere in it.
//!
//! ## Architecture
//!
//! - `types` - Type system (IrType, GEP result-type rule)
//! - `values` - Value representations
//! - `instructions` - IR instructions and terminators
//! - `blocks` - Basic block management
//! - `function` - Function definitions
//! - `module` - The compilation unit
//! - `builder` - IR construction utilities
//! - `verify` - Structural invariant checks

pub use self::blocks::BasicBlock;
pub use self::builder::IrBuilder;
pub use self::function::Function;
pub use self::instructions::Instruction;
pub use self::module::Module;
pub use self::types::{gep_result_type, IrType};
pub use self::values::Value;
pub use self::verify::{verify_function, verify_module, VerifyError};

mod blocks;
mod builder;
mod function;
mod instructions;
mod module;
mod types;
mod values;
mod verify;

#[cfg(test)]
mod tests;
