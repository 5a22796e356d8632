//! Unit tests for the interpreter

use pretty_assertions::assert_eq;
use sylph_common::CompilerError;
use sylph_frontend::compile_to_module;

use super::{run, RtValue};

fn interpret(source: &str) -> Result<super::ExecutionOutcome, CompilerError> {
    let module = compile_to_module(source, "test").unwrap();
    run(&module, "main")
}

fn returned_int(source: &str) -> i64 {
    interpret(source)
        .unwrap()
        .value
        .and_then(|v| v.as_int())
        .expect("expected an integer result")
}

#[test]
fn test_store_load_roundtrip_scenario() {
    // An 8-bit cell holding 'A' survives the store/load round trip
    let module = compile_to_module(
        "(fn main () i8
           (let c i8 (i8 65))
           (ret c))",
        "test",
    )
    .unwrap();
    assert_eq!(
        run(&module, "main").unwrap().value,
        Some(RtValue::Int { bits: 8, value: 65 })
    );
}

#[test]
fn test_store_load_idempotence_both_widths() {
    assert_eq!(
        returned_int(
            "(fn main () i32
               (let x i32 123456)
               (ret x))"
        ),
        123456
    );
    let module = compile_to_module(
        "(fn main () i8
           (let x i8 (i8 -1))
           (ret x))",
        "test",
    )
    .unwrap();
    assert_eq!(
        run(&module, "main").unwrap().value,
        Some(RtValue::Int { bits: 8, value: -1 })
    );
}

#[test]
fn test_i8_store_wraps_to_width() {
    // 300 does not fit in 8 bits; two's complement wrap gives 44
    let module = compile_to_module(
        "(fn main () i8
           (let x i8 (i8 300))
           (ret x))",
        "test",
    )
    .unwrap();
    assert_eq!(
        run(&module, "main").unwrap().value,
        Some(RtValue::Int { bits: 8, value: 44 })
    );
}

#[test]
fn test_gep_boundary_indices() {
    // First and last element of a [4 x i8]
    let source = |index: i64| {
        format!(
            "(fn main () i8
               (let buf (array i8 4) (undef (array i8 4)))
               (store (i8 7) (gep (addr buf) 0 0))
               (store (i8 9) (gep (addr buf) 0 3))
               (ret (load (gep (addr buf) 0 {index}))))"
        )
    };
    let module = compile_to_module(&source(0), "test").unwrap();
    assert_eq!(
        run(&module, "main").unwrap().value.unwrap(),
        RtValue::Int { bits: 8, value: 7 }
    );
    let module = compile_to_module(&source(3), "test").unwrap();
    assert_eq!(
        run(&module, "main").unwrap().value.unwrap(),
        RtValue::Int { bits: 8, value: 9 }
    );
}

#[test]
fn test_gep_first_index_steps_whole_pointees() {
    // (gep p 1) on an i32* moves one whole element
    let value = returned_int(
        "(fn main () i32
           (let pair (array i32 2) (undef (array i32 2)))
           (store 10 (gep (addr pair) 0 0))
           (store 20 (gep (addr pair) 0 1))
           (ret (load (gep (gep (addr pair) 0 0) 1))))",
    );
    assert_eq!(value, 20);
}

#[test]
fn test_puts_scenario_records_literal_argument() {
    let outcome = interpret(
        "(extern puts ((ptr i8)) i32)
         (fn main () i32
           (call puts \"hi\")
           (ret 0))",
    )
    .unwrap();

    assert_eq!(outcome.value, Some(RtValue::Int { bits: 32, value: 0 }));
    assert_eq!(outcome.extern_calls.len(), 1);
    assert_eq!(outcome.extern_calls[0].callee, "puts");
    assert_eq!(outcome.extern_calls[0].args, vec!["hi".to_string()]);
}

#[test]
fn test_puts_result_propagates_as_zero() {
    // A program may return puts's result; the emulation reports zero,
    // matching what a compiled binary's success case can rely on.
    let outcome = interpret(
        "(extern puts ((ptr i8)) i32)
         (fn main () i32 (ret (puts \"hi\")))",
    )
    .unwrap();
    assert_eq!(outcome.value, Some(RtValue::Int { bits: 32, value: 0 }));
}

#[test]
fn test_user_function_call_with_arguments() {
    let value = returned_int(
        "(fn second ((a i32) (b i32)) i32 (ret b))
         (fn main () i32 (ret (second 1 2)))",
    );
    assert_eq!(value, 2);
}

#[test]
fn test_branches_take_both_arms() {
    let source = |x: i64| {
        format!(
            "(fn pick ((x i32)) i32
               (if x ((ret 10)) ((ret 20))))
             (fn main () i32 (ret (pick {x})))"
        )
    };
    let module = compile_to_module(&source(1), "test").unwrap();
    assert_eq!(run(&module, "main").unwrap().value.unwrap().as_int(), Some(10));
    let module = compile_to_module(&source(0), "test").unwrap();
    assert_eq!(run(&module, "main").unwrap().value.unwrap().as_int(), Some(20));
}

#[test]
fn test_join_block_continues_after_if() {
    let value = returned_int(
        "(fn main () i32
           (let out i32 0)
           (if 1 ((set out 40)) ((set out 50)))
           (ret out))",
    );
    assert_eq!(value, 40);
}

#[test]
fn test_undefined_entry_point() {
    let err = interpret("(fn other () i32 (ret 0))").unwrap_err();
    assert_eq!(
        err,
        CompilerError::UndefinedEntryPoint {
            name: "main".to_string()
        }
    );
}

#[test]
fn test_declared_only_entry_point_is_undefined() {
    let module = compile_to_module("(extern main () i32)", "test").unwrap();
    assert!(matches!(
        run(&module, "main").unwrap_err(),
        CompilerError::UndefinedEntryPoint { .. }
    ));
}

#[test]
fn test_null_pointer_dereference_traps() {
    let err = interpret(
        "(fn main () i32
           (ret (load (null (ptr i32)))))",
    )
    .unwrap_err();
    assert!(matches!(err, CompilerError::Trap { .. }));
}

#[test]
fn test_unknown_extern_records_and_returns_zero() {
    let outcome = interpret(
        "(extern mystery (i32) i32)
         (fn main () i32 (ret (mystery 5)))",
    )
    .unwrap();
    assert_eq!(outcome.value, Some(RtValue::Int { bits: 32, value: 0 }));
    assert_eq!(outcome.extern_calls[0].callee, "mystery");
    assert_eq!(outcome.extern_calls[0].args, vec!["5".to_string()]);
}

#[test]
fn test_runaway_recursion_traps() {
    let err = interpret(
        "(fn spin () i32 (ret (spin)))
         (fn main () i32 (ret (spin)))",
    )
    .unwrap_err();
    assert!(matches!(err, CompilerError::Trap { .. }));
}

#[test]
fn test_string_interning_reuses_one_address() {
    // Two uses of the same literal must agree on identity; observable
    // through two extern calls rendering the same content.
    let outcome = interpret(
        "(extern puts ((ptr i8)) i32)
         (fn main () i32
           (call puts \"same\")
           (call puts \"same\")
           (ret 0))",
    )
    .unwrap();
    assert_eq!(outcome.extern_calls.len(), 2);
    assert_eq!(outcome.extern_calls[0].args, outcome.extern_calls[1].args);
}
