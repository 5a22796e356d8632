//! IR Instructions
//!
//! Defines all instruction kinds available in the IR. Each instruction
//! belongs to exactly one basic block and produces at most one value.
//! The terminator kinds (`Ret`, `Br`, `BrCond`) form their own subset;
//! new control-transfer kinds extend this enum without disturbing the
//! rest of the IR.

use serde::{Deserialize, Serialize};
use std::fmt;
use sylph_common::{LabelId, TempId};

use crate::ir::{IrType, Value};

/// IR Instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Allocate stack storage: result = alloca type
    Alloca { result: TempId, alloc_type: IrType },

    /// Store to memory: store value, ptr
    Store { value: Value, ptr: Value },

    /// Load from memory: result = load ptr
    Load {
        result: TempId,
        ptr: Value,
        result_type: IrType,
    },

    /// Address computation: result = getelementptr base, indices
    ///
    /// The index chain is non-empty; the result type is derived
    /// structurally from the base pointer via `gep_result_type`. No
    /// memory is touched.
    GetElementPtr {
        result: TempId,
        base: Value,
        indices: Vec<Value>,
        result_type: IrType,
    },

    /// Function call: result = call callee(args...)
    Call {
        result: Option<TempId>,
        callee: String,
        args: Vec<Value>,
        result_type: IrType,
    },

    /// Return: ret value or ret void (terminator)
    Ret(Option<Value>),

    /// Unconditional branch: br label (terminator)
    Br(LabelId),

    /// Conditional branch: br condition, then, else (terminator)
    BrCond {
        condition: Value,
        then_block: LabelId,
        else_block: LabelId,
    },
}

impl Instruction {
    /// Whether this instruction ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Ret(_) | Instruction::Br(_) | Instruction::BrCond { .. }
        )
    }

    /// The temp this instruction defines, if any
    pub fn result(&self) -> Option<TempId> {
        match self {
            Instruction::Alloca { result, .. } => Some(*result),
            Instruction::Load { result, .. } => Some(*result),
            Instruction::GetElementPtr { result, .. } => Some(*result),
            Instruction::Call { result, .. } => *result,
            _ => None,
        }
    }

    /// The values this instruction consumes
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Instruction::Alloca { .. } => Vec::new(),
            Instruction::Store { value, ptr } => vec![value, ptr],
            Instruction::Load { ptr, .. } => vec![ptr],
            Instruction::GetElementPtr { base, indices, .. } => {
                let mut ops = vec![base];
                ops.extend(indices.iter());
                ops
            }
            Instruction::Call { args, .. } => args.iter().collect(),
            Instruction::Ret(Some(value)) => vec![value],
            Instruction::Ret(None) => Vec::new(),
            Instruction::Br(_) => Vec::new(),
            Instruction::BrCond { condition, .. } => vec![condition],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Alloca { result, alloc_type } => {
                write!(f, "%{result} = alloca {alloc_type}")
            }
            Instruction::Store { value, ptr } => {
                write!(f, "store {value}, {ptr}")
            }
            Instruction::Load {
                result,
                ptr,
                result_type,
            } => {
                write!(f, "%{result} = load {result_type}, {ptr}")
            }
            Instruction::GetElementPtr {
                result,
                base,
                indices,
                ..
            } => {
                write!(f, "%{result} = getelementptr {base}")?;
                for index in indices {
                    write!(f, ", {index}")?;
                }
                Ok(())
            }
            Instruction::Call {
                result,
                callee,
                args,
                result_type,
            } => {
                if let Some(result) = result {
                    write!(f, "%{result} = ")?;
                }
                write!(f, "call {result_type} @{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instruction::Ret(Some(value)) => write!(f, "ret {value}"),
            Instruction::Ret(None) => write!(f, "ret void"),
            Instruction::Br(label) => write!(f, "br label %bb{label}"),
            Instruction::BrCond {
                condition,
                then_block,
                else_block,
            } => {
                write!(f, "br {condition}, label %bb{then_block}, label %bb{else_block}")
            }
        }
    }
}
