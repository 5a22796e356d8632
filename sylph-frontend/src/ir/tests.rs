//! Unit tests for the IR module

use super::*;

#[test]
fn test_ir_values() {
    let temp = Value::Temp(5);
    let constant = Value::const_i32(42);
    let null = Value::ConstNull(IrType::ptr(IrType::i8()));

    assert_eq!(format!("{}", temp), "%5");
    assert_eq!(format!("{}", constant), "i32 42");
    assert_eq!(format!("{}", null), "i8* null");
}

#[test]
fn test_type_display() {
    assert_eq!(IrType::i8().to_string(), "i8");
    assert_eq!(IrType::ptr(IrType::i32()).to_string(), "i32*");
    assert_eq!(IrType::array(IrType::i8(), 3).to_string(), "[3 x i8]");

    let fn_ty = IrType::Function {
        return_type: Box::new(IrType::i32()),
        param_types: vec![IrType::ptr(IrType::i8())],
        is_vararg: false,
    };
    assert_eq!(fn_ty.to_string(), "i32 (i8*)");
}

#[test]
fn test_structural_type_equality() {
    let a = IrType::array(IrType::i8(), 4);
    let b = IrType::array(IrType::i8(), 4);
    assert_eq!(a, b);

    use std::collections::HashMap;
    let mut memo = HashMap::new();
    memo.insert(a, 1u32);
    assert_eq!(memo.get(&b), Some(&1));
}

#[test]
fn test_gep_result_type() {
    // One index over a scalar pointer keeps the pointee
    let base = IrType::ptr(IrType::i32());
    assert_eq!(gep_result_type(&base, 1), Some(IrType::ptr(IrType::i32())));

    // Second index steps into the array
    let arr_ptr = IrType::ptr(IrType::array(IrType::i8(), 16));
    assert_eq!(
        gep_result_type(&arr_ptr, 1),
        Some(IrType::ptr(IrType::array(IrType::i8(), 16)))
    );
    assert_eq!(gep_result_type(&arr_ptr, 2), Some(IrType::ptr(IrType::i8())));

    // Index path deeper than the type structure
    assert_eq!(gep_result_type(&arr_ptr, 3), None);
    // Empty index chains are invalid
    assert_eq!(gep_result_type(&arr_ptr, 0), None);
    // Non-pointer base
    assert_eq!(gep_result_type(&IrType::i32(), 1), None);
}

#[test]
fn test_basic_block() {
    let mut block = BasicBlock::new(0);
    assert!(block.is_empty());
    assert!(!block.has_terminator());

    block.add_instruction(Instruction::Store {
        value: Value::const_i32(1),
        ptr: Value::Temp(0),
    });
    assert!(!block.is_empty());
    assert!(!block.has_terminator());

    block.add_instruction(Instruction::Ret(Some(Value::const_i32(0))));
    assert!(block.has_terminator());
    assert!(block.successors().is_empty());
}

#[test]
fn test_block_successors() {
    let mut block = BasicBlock::new(0);
    block.add_instruction(Instruction::BrCond {
        condition: Value::const_i8(1),
        then_block: 1,
        else_block: 2,
    });
    assert_eq!(block.successors(), vec![1, 2]);
}

#[test]
fn test_ir_builder() {
    let mut builder = IrBuilder::new();
    builder.create_function("answer".to_string(), IrType::i32());

    let entry = builder.new_label();
    builder.create_block(entry).unwrap();

    let cell = builder.build_alloca(IrType::i32()).unwrap();
    builder
        .build_store(Value::const_i32(42), Value::Temp(cell))
        .unwrap();
    let loaded = builder
        .build_load(Value::Temp(cell), IrType::i32())
        .unwrap();
    builder.build_ret(Some(Value::Temp(loaded))).unwrap();

    let function = builder.finish_function().unwrap();
    assert_eq!(function.name, "answer");
    assert_eq!(function.blocks.len(), 1);
    assert_eq!(function.blocks[0].instructions.len(), 4);
    assert!(function.is_defined());
}

#[test]
fn test_builder_rejects_instruction_after_terminator() {
    let mut builder = IrBuilder::new();
    builder.create_function("f".to_string(), IrType::Void);
    let entry = builder.new_label();
    builder.create_block(entry).unwrap();
    builder.build_ret(None).unwrap();

    assert!(builder.build_alloca(IrType::i8()).is_err());
}

#[test]
fn test_entry_alloca_is_hoisted() {
    let mut builder = IrBuilder::new();
    builder.create_function("f".to_string(), IrType::i32());
    let entry = builder.new_label();
    builder.create_block(entry).unwrap();

    let first = builder.build_entry_alloca(IrType::i32()).unwrap();
    builder
        .build_store(Value::const_i32(1), Value::Temp(first))
        .unwrap();
    // A later binding still lands in the entry prologue, before the store
    let second = builder.build_entry_alloca(IrType::i8()).unwrap();
    builder.build_ret(Some(Value::const_i32(0))).unwrap();

    let function = builder.finish_function().unwrap();
    let instrs = &function.blocks[0].instructions;
    assert!(matches!(instrs[0], Instruction::Alloca { result, .. } if result == first));
    assert!(matches!(instrs[1], Instruction::Alloca { result, .. } if result == second));
    assert!(matches!(instrs[2], Instruction::Store { .. }));
}

#[test]
fn test_module() {
    let mut module = Module::new("test".to_string());
    let function = Function::new("main".to_string(), IrType::i32());
    module.add_function(function);

    assert_eq!(module.functions.len(), 1);
    assert!(module.get_function("main").is_some());
    assert!(module.get_function("missing").is_none());
}

fn single_block_module(instructions: Vec<Instruction>) -> Module {
    let mut module = Module::new("t".to_string());
    let mut function = Function::new("main".to_string(), IrType::i32());
    let mut block = BasicBlock::new(0);
    for instr in instructions {
        block.add_instruction(instr);
    }
    function.add_block(block);
    module.add_function(function);
    module
}

#[test]
fn test_verify_accepts_well_formed_module() {
    let module = single_block_module(vec![
        Instruction::Alloca {
            result: 0,
            alloc_type: IrType::i8(),
        },
        Instruction::Store {
            value: Value::const_i8(65),
            ptr: Value::Temp(0),
        },
        Instruction::Load {
            result: 1,
            ptr: Value::Temp(0),
            result_type: IrType::i8(),
        },
        Instruction::Ret(Some(Value::Temp(1))),
    ]);
    assert!(verify_module(&module).is_ok());
}

#[test]
fn test_verify_rejects_use_before_def() {
    let module = single_block_module(vec![
        Instruction::Load {
            result: 0,
            ptr: Value::Temp(7),
            result_type: IrType::i32(),
        },
        Instruction::Ret(Some(Value::Temp(0))),
    ]);
    let err = verify_module(&module).unwrap_err();
    assert!(err.message.contains("undefined value %7"));
}

#[test]
fn test_verify_rejects_missing_terminator() {
    let module = single_block_module(vec![Instruction::Alloca {
        result: 0,
        alloc_type: IrType::i32(),
    }]);
    let err = verify_module(&module).unwrap_err();
    assert!(err.message.contains("terminator"));
}

#[test]
fn test_verify_rejects_duplicate_function_names() {
    let mut module = single_block_module(vec![Instruction::Ret(Some(Value::const_i32(0)))]);
    let mut dup = Function::new("main".to_string(), IrType::i32());
    dup.is_external = true;
    module.add_function(dup);

    let err = verify_module(&module).unwrap_err();
    assert!(err.message.contains("duplicate function name"));
}

#[test]
fn test_verify_rejects_bad_call_arity() {
    let mut module = Module::new("t".to_string());
    let mut puts = Function::new("puts".to_string(), IrType::i32());
    puts.add_parameter(0, IrType::ptr(IrType::i8()));
    puts.is_external = true;
    module.add_function(puts);

    let mut main = Function::new("main".to_string(), IrType::i32());
    let mut block = BasicBlock::new(0);
    block.add_instruction(Instruction::Call {
        result: Some(0),
        callee: "puts".to_string(),
        args: Vec::new(),
        result_type: IrType::i32(),
    });
    block.add_instruction(Instruction::Ret(Some(Value::Temp(0))));
    main.add_block(block);
    module.add_function(main);

    let err = verify_module(&module).unwrap_err();
    assert!(err.message.contains("expected 1"));
}

#[test]
fn test_verify_rejects_branch_to_unknown_block() {
    let module = single_block_module(vec![Instruction::Br(9)]);
    let err = verify_module(&module).unwrap_err();
    assert!(err.message.contains("unknown block bb9"));
}

#[test]
fn test_function_display() {
    let mut function = Function::new("main".to_string(), IrType::i32());
    let mut block = BasicBlock::new(0);
    block.add_instruction(Instruction::Ret(Some(Value::const_i32(65))));
    function.add_block(block);

    let printed = function.to_string();
    assert!(printed.contains("define i32 @main()"));
    assert!(printed.contains("ret i32 65"));
}
