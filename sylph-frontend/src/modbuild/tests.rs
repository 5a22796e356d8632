//! Unit tests for the module builder

use pretty_assertions::assert_eq;
use sylph_common::CompilerError;

use super::ModuleBuilder;
use crate::ast::parse_forms;
use crate::ir::{verify_module, Instruction, IrType, Module, Value};

fn build(source: &str) -> Result<Module, CompilerError> {
    let forms = parse_forms(source).unwrap();
    ModuleBuilder::new("test".to_string()).build(&forms)
}

#[test]
fn test_build_simple_main() {
    let module = build("(fn main () i32 (ret 42))").unwrap();
    assert_eq!(module.functions.len(), 1);

    let main = module.get_function("main").unwrap();
    assert!(main.is_defined());
    assert_eq!(main.return_type, IrType::i32());
    assert_eq!(main.blocks.len(), 1);
    assert_eq!(
        main.blocks[0].instructions,
        vec![Instruction::Ret(Some(Value::const_i32(42)))]
    );

    verify_module(&module).unwrap();
}

#[test]
fn test_let_synthesizes_entry_alloca() {
    let module = build(
        "(fn main () i8
           (let c i8 (i8 65))
           (ret c))",
    )
    .unwrap();

    let main = module.get_function("main").unwrap();
    let instrs = &main.blocks[0].instructions;
    // alloca first, then the initializing store, then the load for `c`
    assert!(matches!(
        instrs[0],
        Instruction::Alloca { ref alloc_type, .. } if *alloc_type == IrType::i8()
    ));
    assert!(matches!(instrs[1], Instruction::Store { .. }));
    assert!(matches!(instrs[2], Instruction::Load { .. }));
    assert!(matches!(instrs[3], Instruction::Ret(Some(Value::Temp(_)))));

    verify_module(&module).unwrap();
}

#[test]
fn test_multiple_lets_all_hoisted_before_first_store() {
    let module = build(
        "(fn main () i32
           (let a i32 1)
           (let b i32 2)
           (ret b))",
    )
    .unwrap();

    let instrs = &module.get_function("main").unwrap().blocks[0].instructions;
    assert!(matches!(instrs[0], Instruction::Alloca { .. }));
    assert!(matches!(instrs[1], Instruction::Alloca { .. }));
    assert!(matches!(instrs[2], Instruction::Store { .. }));
}

#[test]
fn test_extern_and_call() {
    let module = build(
        "(extern puts ((ptr i8)) i32)
         (fn main () i32
           (call puts \"hi\")
           (ret 0))",
    )
    .unwrap();

    let puts = module.get_function("puts").unwrap();
    assert!(puts.is_external);
    assert_eq!(puts.parameters.len(), 1);

    let main = module.get_function("main").unwrap();
    let instrs = &main.blocks[0].instructions;
    assert!(matches!(
        instrs[0],
        Instruction::Call { ref callee, ref args, .. }
            if callee == "puts" && args == &[Value::Str("hi".to_string())]
    ));

    verify_module(&module).unwrap();
}

#[test]
fn test_call_sugar_without_call_keyword() {
    let module = build(
        "(extern getchar () i32)
         (fn main () i32 (ret (getchar)))",
    )
    .unwrap();
    verify_module(&module).unwrap();
}

#[test]
fn test_arguments_linearize_left_to_right() {
    let module = build(
        "(extern left () i32)
         (extern right () i32)
         (extern both (i32 i32) i32)
         (fn main () i32 (ret (both (left) (right))))",
    )
    .unwrap();

    let instrs = &module.get_function("main").unwrap().blocks[0].instructions;
    let callees: Vec<&str> = instrs
        .iter()
        .filter_map(|i| match i {
            Instruction::Call { callee, .. } => Some(callee.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(callees, vec!["left", "right", "both"]);
}

#[test]
fn test_gep_load_store_on_array() {
    let module = build(
        "(fn main () i8
           (let buf (array i8 4) (undef (array i8 4)))
           (store (i8 65) (gep (addr buf) 0 2))
           (ret (load (gep (addr buf) 0 2))))",
    )
    .unwrap();

    let main = module.get_function("main").unwrap();
    let geps: Vec<_> = main.blocks[0]
        .instructions
        .iter()
        .filter(|i| matches!(i, Instruction::GetElementPtr { .. }))
        .collect();
    assert_eq!(geps.len(), 2);
    if let Instruction::GetElementPtr { result_type, .. } = geps[0] {
        assert_eq!(*result_type, IrType::ptr(IrType::i8()));
    }

    verify_module(&module).unwrap();
}

#[test]
fn test_if_produces_branch_blocks() {
    let module = build(
        "(fn main ((x i32)) i32
           (let out i32 0)
           (if x ((set out 1)) ((set out 2)))
           (ret out))",
    )
    .unwrap();

    let main = module.get_function("main").unwrap();
    // entry, then, else, join
    assert_eq!(main.blocks.len(), 4);
    assert!(main.blocks[0]
        .instructions
        .last()
        .is_some_and(|i| matches!(i, Instruction::BrCond { .. })));

    verify_module(&module).unwrap();
}

#[test]
fn test_if_with_both_arms_returning() {
    let module = build(
        "(fn pick ((x i32)) i32
           (if x ((ret 1)) ((ret 2))))",
    )
    .unwrap();
    // no join block: entry, then, else
    assert_eq!(module.get_function("pick").unwrap().blocks.len(), 3);
    verify_module(&module).unwrap();
}

#[test]
fn test_void_function_gets_implicit_ret() {
    let module = build("(fn noop () void)").unwrap();
    let noop = module.get_function("noop").unwrap();
    assert_eq!(
        noop.blocks[0].instructions,
        vec![Instruction::Ret(None)]
    );
}

#[test]
fn test_missing_ret_in_non_void_function() {
    let err = build("(fn main () i32 (let x i32 1))").unwrap_err();
    assert!(matches!(err, CompilerError::UnsupportedConstruct { .. }));
}

#[test]
fn test_duplicate_definition_is_name_conflict() {
    let err = build("(fn main () i32 (ret 0)) (fn main () i32 (ret 1))").unwrap_err();
    assert_eq!(
        err,
        CompilerError::NameConflict {
            name: "main".to_string()
        }
    );
}

#[test]
fn test_extern_then_mismatched_definition() {
    let err = build(
        "(extern f (i32) i32)
         (fn f () i32 (ret 0))",
    )
    .unwrap_err();
    assert!(matches!(err, CompilerError::SignatureMismatch { .. }));
}

#[test]
fn test_extern_then_matching_definition_is_allowed() {
    let module = build(
        "(extern f (i32) i32)
         (fn f ((x i32)) i32 (ret x))",
    )
    .unwrap();
    assert!(module.get_function("f").unwrap().is_defined());
}

#[test]
fn test_duplicate_let_is_name_conflict() {
    let err = build(
        "(fn main () i32
           (let x i32 1)
           (let x i32 2)
           (ret x))",
    )
    .unwrap_err();
    assert!(matches!(err, CompilerError::NameConflict { .. }));
}

#[test]
fn test_loaded_value_does_not_widen_implicitly() {
    // Only constants retype; a loaded i8 cannot flow into an i32 slot
    let err = build(
        "(fn main () i32
           (let c i8 (i8 65))
           (ret c))",
    )
    .unwrap_err();
    assert!(matches!(err, CompilerError::UnsupportedConstruct { .. }));
}

#[test]
fn test_unknown_form_is_unsupported() {
    let err = build("(fn main () i32 (ret (frobnicate 1)))").unwrap_err();
    assert!(matches!(err, CompilerError::UnsupportedConstruct { .. }));

    let err = build("(blorp main)").unwrap_err();
    assert!(matches!(err, CompilerError::UnsupportedConstruct { .. }));
}

#[test]
fn test_int_literal_coerces_to_declared_width() {
    let module = build(
        "(fn main () i8
           (let c i8 65)
           (ret c))",
    )
    .unwrap();

    let instrs = &module.get_function("main").unwrap().blocks[0].instructions;
    assert!(matches!(
        instrs[1],
        Instruction::Store {
            value: Value::ConstInt { ref ty, value: 65, .. },
            ..
        } if *ty == IrType::i8()
    ));
}
