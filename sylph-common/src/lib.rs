//! Sylph compiler - Common Types and Utilities
//!
//! This crate contains shared types and error definitions used across
//! all components of the Sylph compiler.

pub mod error;
pub mod types;

pub use error::CompilerError;
pub use types::{LabelId, TempId};
