//! Expanded AST
//!
//! The module builder consumes an already-expanded program: a sequence
//! of s-expression forms produced by the (external) expander. This
//! module defines the node set and a reader for the on-disk textual
//! dump of those forms. There is no macro expansion and no surface
//! syntax here; the reader only reconstructs the tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use sylph_common::CompilerError;

/// One expanded-form node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Bare symbol, e.g. `main` or `i32`
    Symbol(String),
    /// Integer literal
    Int(i64),
    /// String literal
    Str(String),
    /// Parenthesized form
    List(Vec<Expr>),
}

impl Expr {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Expr]> {
        match self {
            Expr::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(name) => write!(f, "{name}"),
            Expr::Int(value) => write!(f, "{value}"),
            Expr::Str(content) => write!(f, "{content:?}"),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Read a whole file of expanded forms
pub fn parse_forms(source: &str) -> Result<Vec<Expr>, CompilerError> {
    let mut reader = Reader {
        chars: source.chars().collect(),
        pos: 0,
    };
    let mut forms = Vec::new();
    loop {
        reader.skip_trivia();
        if reader.at_end() {
            break;
        }
        forms.push(reader.read_expr()?);
    }
    Ok(forms)
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == ';' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_expr(&mut self) -> Result<Expr, CompilerError> {
        self.skip_trivia();
        match self.peek() {
            None => Err(CompilerError::unsupported("unexpected end of input")),
            Some('(') => self.read_list(),
            Some(')') => Err(CompilerError::unsupported("unexpected `)`")),
            Some('"') => self.read_string(),
            Some(_) => self.read_atom(),
        }
    }

    fn read_list(&mut self) -> Result<Expr, CompilerError> {
        self.bump(); // (
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(CompilerError::unsupported("unclosed `(`")),
                Some(')') => {
                    self.bump();
                    return Ok(Expr::List(items));
                }
                Some(_) => items.push(self.read_expr()?),
            }
        }
    }

    fn read_string(&mut self) -> Result<Expr, CompilerError> {
        self.bump(); // "
        let mut content = String::new();
        loop {
            match self.bump() {
                None => return Err(CompilerError::unsupported("unclosed string literal")),
                Some('"') => return Ok(Expr::Str(content)),
                Some('\\') => match self.bump() {
                    Some('n') => content.push('\n'),
                    Some('t') => content.push('\t'),
                    Some('0') => content.push('\0'),
                    Some('\\') => content.push('\\'),
                    Some('"') => content.push('"'),
                    other => {
                        return Err(CompilerError::unsupported(format!(
                            "unknown string escape: {other:?}"
                        )))
                    }
                },
                Some(c) => content.push(c),
            }
        }
    }

    fn read_atom(&mut self) -> Result<Expr, CompilerError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == ';' || c == '"' {
                break;
            }
            text.push(c);
            self.pos += 1;
        }
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Expr::Int(value));
        }
        Ok(Expr::Symbol(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_atoms_and_lists() {
        let forms = parse_forms("(fn main () i32 (ret 0))").unwrap();
        assert_eq!(forms.len(), 1);
        let Expr::List(items) = &forms[0] else {
            panic!("expected list");
        };
        assert_eq!(items[0], Expr::Symbol("fn".to_string()));
        assert_eq!(items[1], Expr::Symbol("main".to_string()));
    }

    #[test]
    fn test_read_negative_int_and_string() {
        let forms = parse_forms("-42 \"hi\\n\"").unwrap();
        assert_eq!(forms[0], Expr::Int(-42));
        assert_eq!(forms[1], Expr::Str("hi\n".to_string()));
    }

    #[test]
    fn test_comments_are_skipped() {
        let forms = parse_forms("; header\n(ret 0) ; trailing\n").unwrap();
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn test_unclosed_list_is_rejected() {
        assert!(parse_forms("(fn main").is_err());
    }
}
