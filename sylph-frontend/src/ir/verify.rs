//! Structural IR verification
//!
//! Checks the Module IR invariants before either backend consumes it:
//! unique function names, well-terminated non-empty blocks, resolvable
//! branch targets, non-empty GEP index chains, call arity, and
//! use-before-def in program order. Strict dominance is not checked;
//! a value defined in any earlier-visited block satisfies the check.

use std::collections::HashSet;

use thiserror::Error;

use crate::ir::{Function, Instruction, Module, Value};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("verify error: {message}")]
pub struct VerifyError {
    pub message: String,
}

fn err(message: String) -> Result<(), VerifyError> {
    Err(VerifyError { message })
}

/// Verify a whole module
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    let mut names = HashSet::new();
    for function in &module.functions {
        if !names.insert(function.name.as_str()) {
            return err(format!("duplicate function name `{}`", function.name));
        }
    }

    for function in &module.functions {
        verify_function(module, function)?;
    }
    Ok(())
}

/// Verify one function against the block and use-before-def invariants
pub fn verify_function(module: &Module, function: &Function) -> Result<(), VerifyError> {
    if function.is_external {
        if !function.blocks.is_empty() {
            return err(format!(
                "declared function `{}` must not have a body",
                function.name
            ));
        }
        return Ok(());
    }

    if function.blocks.is_empty() {
        return err(format!(
            "defined function `{}` has no basic blocks",
            function.name
        ));
    }

    let block_ids: HashSet<_> = function.blocks.iter().map(|b| b.id).collect();
    if block_ids.len() != function.blocks.len() {
        return err(format!(
            "duplicate basic block id in function `{}`",
            function.name
        ));
    }

    let mut defined: HashSet<_> = function.parameters.iter().map(|(id, _)| *id).collect();

    for block in &function.blocks {
        if block.is_empty() {
            return err(format!(
                "empty basic block bb{} in function `{}`",
                block.id, function.name
            ));
        }
        if !block.has_terminator() {
            return err(format!(
                "basic block bb{} in function `{}` does not end in a terminator",
                block.id, function.name
            ));
        }

        for (index, instr) in block.instructions.iter().enumerate() {
            let is_last = index + 1 == block.instructions.len();
            if instr.is_terminator() && !is_last {
                return err(format!(
                    "instruction after terminator in bb{} of `{}`",
                    block.id, function.name
                ));
            }

            for operand in instr.operands() {
                if let Value::Temp(id) = operand {
                    if !defined.contains(id) {
                        return err(format!(
                            "use of undefined value %{id} in bb{} of `{}`",
                            block.id, function.name
                        ));
                    }
                }
            }

            verify_instruction(module, function, instr)?;

            if let Some(result) = instr.result() {
                if !defined.insert(result) {
                    return err(format!(
                        "value %{result} defined twice in `{}`",
                        function.name
                    ));
                }
            }
        }

        for successor in block.successors() {
            if !block_ids.contains(&successor) {
                return err(format!(
                    "branch to unknown block bb{successor} in `{}`",
                    function.name
                ));
            }
        }
    }

    Ok(())
}

fn verify_instruction(
    module: &Module,
    function: &Function,
    instr: &Instruction,
) -> Result<(), VerifyError> {
    match instr {
        Instruction::GetElementPtr { indices, .. } => {
            if indices.is_empty() {
                return err(format!(
                    "getelementptr with empty index chain in `{}`",
                    function.name
                ));
            }
        }
        Instruction::Call { callee, args, .. } => {
            let Some(target) = module.get_function(callee) else {
                return err(format!(
                    "call to unknown function `{callee}` in `{}`",
                    function.name
                ));
            };
            let fixed = target.parameters.len();
            let arity_ok = if target.is_vararg {
                args.len() >= fixed
            } else {
                args.len() == fixed
            };
            if !arity_ok {
                return err(format!(
                    "call to `{callee}` with {} arguments, expected {fixed}",
                    args.len()
                ));
            }
        }
        _ => {}
    }
    Ok(())
}
