//! Sylph compiler - Frontend
//!
//! This crate provides the pieces that sit in front of the two
//! execution paths:
//! - `ast`: the expanded-form node set and its reader
//! - `ir`: the Module IR shared by the native backend and the
//!   interpreter
//! - `modbuild`: the ModuleBuilder turning expanded forms into IR
//!
//! Lexing, parsing and macro expansion happen outside this crate; the
//! input here is already-expanded forms.

pub mod ast;
pub mod ir;
pub mod modbuild;

pub use ast::{parse_forms, Expr};
pub use ir::Module;
pub use modbuild::ModuleBuilder;

use sylph_common::CompilerError;

/// Build a Module IR from expanded source text.
///
/// Convenience entry point for the driver and tests: reads the forms
/// and runs the ModuleBuilder.
pub fn compile_to_module(source: &str, module_name: &str) -> Result<Module, CompilerError> {
    let forms = parse_forms(source)?;
    ModuleBuilder::new(module_name.to_string()).build(&forms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_to_module() {
        let module = compile_to_module("(fn main () i32 (ret 42))", "demo").unwrap();
        assert_eq!(module.name, "demo");
        assert!(module.get_function("main").is_some());
    }

    #[test]
    fn test_compile_to_module_propagates_reader_errors() {
        assert!(compile_to_module("(fn main", "demo").is_err());
    }
}
