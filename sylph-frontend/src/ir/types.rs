//! IR Type System
//!
//! Defines the type system for the Module IR: integer types of arbitrary
//! width, pointers, arrays and function types. Types are structurally
//! compared; two types with identical shape are interchangeable, and the
//! native backend relies on `Eq + Hash` to memoize one native handle per
//! shape.

use serde::{Deserialize, Serialize};
use std::fmt;

/// IR Type system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    /// Void type
    Void,

    /// Integer type with bit width (i8 and i32 are the widths the
    /// surface language produces; any width is representable)
    Int { bits: u32 },

    /// Pointer type
    Ptr(Box<IrType>),

    /// Array type [size x element]
    Array { element: Box<IrType>, size: u64 },

    /// Function type
    Function {
        return_type: Box<IrType>,
        param_types: Vec<IrType>,
        is_vararg: bool,
    },
}

impl IrType {
    pub fn i8() -> Self {
        IrType::Int { bits: 8 }
    }

    pub fn i32() -> Self {
        IrType::Int { bits: 32 }
    }

    pub fn ptr(pointee: IrType) -> Self {
        IrType::Ptr(Box::new(pointee))
    }

    pub fn array(element: IrType, size: u64) -> Self {
        IrType::Array {
            element: Box::new(element),
            size,
        }
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::Int { .. })
    }

    /// Check if this is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    /// Get the pointed-to type for pointers
    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(target) => Some(target),
            _ => None,
        }
    }

    /// Size of this type in abstract interpreter cells. One cell holds
    /// one scalar (integer of any width, or pointer); aggregates are
    /// contiguous. Void and function types have no size.
    pub fn size_in_cells(&self) -> Option<u64> {
        match self {
            IrType::Void => None,
            IrType::Int { .. } => Some(1),
            IrType::Ptr(_) => Some(1),
            IrType::Array { element, size } => {
                element.size_in_cells().map(|elem| elem * size)
            }
            IrType::Function { .. } => None,
        }
    }
}

/// Compute the type of a `getelementptr` result.
///
/// `base` must be a pointer. The first index steps over whole pointees
/// and does not change the type; each subsequent index steps into the
/// aggregate, replacing the current type with its element type. Returns
/// the pointer type of the computed address, or `None` when the index
/// path does not match the type structure (including the empty path,
/// which is invalid).
pub fn gep_result_type(base: &IrType, index_count: usize) -> Option<IrType> {
    if index_count == 0 {
        return None;
    }

    let mut current = base.pointee()?.clone();
    for _ in 1..index_count {
        current = match current {
            IrType::Array { element, .. } => *element,
            _ => return None,
        };
    }
    Some(IrType::Ptr(Box::new(current)))
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Int { bits } => write!(f, "i{bits}"),
            IrType::Ptr(target) => write!(f, "{target}*"),
            IrType::Array { element, size } => write!(f, "[{size} x {element}]"),
            IrType::Function {
                return_type,
                param_types,
                is_vararg,
            } => {
                write!(f, "{return_type} (")?;
                for (i, param) in param_types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                if *is_vararg {
                    write!(f, ", ...")?;
                }
                write!(f, ")")
            }
        }
    }
}
