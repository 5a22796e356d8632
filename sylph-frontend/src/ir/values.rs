//! IR Value Representations
//!
//! Defines values that can be used as operands in IR instructions:
//! instruction results (temps) and module-level constants. Values are
//! referenced by later instructions, never copied structurally.

use serde::{Deserialize, Serialize};
use std::fmt;
use sylph_common::TempId;

use crate::ir::IrType;

/// IR Value - represents operands in IR instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The value produced at a program point (instruction result or
    /// function parameter)
    Temp(TempId),

    /// Integer constant with an explicit type and sign-extension flag
    ConstInt {
        ty: IrType,
        value: i64,
        sign_extend: bool,
    },

    /// Null pointer of the given pointer type
    ConstNull(IrType),

    /// Undefined value of a type
    Undef(IrType),

    /// Global NUL-terminated string constant; its type is i8*
    Str(String),
}

impl Value {
    pub fn const_i32(value: i64) -> Self {
        Value::ConstInt {
            ty: IrType::i32(),
            value,
            sign_extend: true,
        }
    }

    pub fn const_i8(value: i64) -> Self {
        Value::ConstInt {
            ty: IrType::i8(),
            value,
            sign_extend: true,
        }
    }

    /// The statically known type of this value, if it carries one.
    /// Temps do not: their type lives with the instruction that
    /// produced them.
    pub fn const_type(&self) -> Option<IrType> {
        match self {
            Value::Temp(_) => None,
            Value::ConstInt { ty, .. } => Some(ty.clone()),
            Value::ConstNull(ty) => Some(ty.clone()),
            Value::Undef(ty) => Some(ty.clone()),
            Value::Str(_) => Some(IrType::ptr(IrType::i8())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(id) => write!(f, "%{id}"),
            Value::ConstInt { ty, value, .. } => write!(f, "{ty} {value}"),
            Value::ConstNull(ty) => write!(f, "{ty} null"),
            Value::Undef(ty) => write!(f, "{ty} undef"),
            Value::Str(content) => write!(f, "c{content:?}"),
        }
    }
}
