//! Type parsing for expanded forms
//!
//! Maps the surface type notation onto `IrType`: `void`, `iN`,
//! `(ptr T)` and `(array T N)`.

use sylph_common::CompilerError;

use crate::ast::Expr;
use crate::ir::IrType;

/// Whether a symbol names an integer type (`i8`, `i32`, ...)
pub(crate) fn is_int_type_name(name: &str) -> bool {
    parse_int_bits(name).is_some()
}

fn parse_int_bits(name: &str) -> Option<u32> {
    let bits = name.strip_prefix('i')?.parse::<u32>().ok()?;
    if bits == 0 || bits > 128 {
        return None;
    }
    Some(bits)
}

/// Parse a type form
pub fn parse_type(expr: &Expr) -> Result<IrType, CompilerError> {
    match expr {
        Expr::Symbol(name) if name == "void" => Ok(IrType::Void),
        Expr::Symbol(name) => parse_int_bits(name)
            .map(|bits| IrType::Int { bits })
            .ok_or_else(|| CompilerError::unsupported(format!("unknown type `{name}`"))),
        Expr::List(items) => match items.first().and_then(Expr::as_symbol) {
            Some("ptr") => {
                let [_, pointee] = items.as_slice() else {
                    return Err(CompilerError::unsupported("ptr type must be (ptr T)"));
                };
                Ok(IrType::ptr(parse_type(pointee)?))
            }
            Some("array") => {
                let [_, element, Expr::Int(size)] = items.as_slice() else {
                    return Err(CompilerError::unsupported(
                        "array type must be (array T N)",
                    ));
                };
                if *size < 0 {
                    return Err(CompilerError::unsupported("array length must be >= 0"));
                }
                Ok(IrType::array(parse_type(element)?, *size as u64))
            }
            _ => Err(CompilerError::unsupported(format!(
                "unknown type form `{expr}`"
            ))),
        },
        _ => Err(CompilerError::unsupported(format!(
            "unknown type form `{expr}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_forms;

    fn ty(source: &str) -> Result<IrType, CompilerError> {
        let forms = parse_forms(source).unwrap();
        parse_type(&forms[0])
    }

    #[test]
    fn test_parse_scalar_types() {
        assert_eq!(ty("void").unwrap(), IrType::Void);
        assert_eq!(ty("i8").unwrap(), IrType::i8());
        assert_eq!(ty("i32").unwrap(), IrType::i32());
    }

    #[test]
    fn test_parse_compound_types() {
        assert_eq!(ty("(ptr i8)").unwrap(), IrType::ptr(IrType::i8()));
        assert_eq!(
            ty("(array i8 4)").unwrap(),
            IrType::array(IrType::i8(), 4)
        );
        assert_eq!(
            ty("(ptr (array i32 2))").unwrap(),
            IrType::ptr(IrType::array(IrType::i32(), 2))
        );
    }

    #[test]
    fn test_reject_unknown_types() {
        assert!(ty("float").is_err());
        assert!(ty("i0").is_err());
        assert!(ty("(ptr)").is_err());
        assert!(ty("(array i8)").is_err());
    }
}
