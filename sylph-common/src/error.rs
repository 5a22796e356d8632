//! Error handling for the Sylph compiler
//!
//! This module defines the error taxonomy shared by every phase: module
//! building, native lowering, verification and interpretation. Every
//! failure is deterministic for a given input; nothing here is retried.

use thiserror::Error;

/// Main compiler error type that encompasses all phases of compilation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// The expanded AST contains a form the IR cannot express.
    #[error("unsupported construct: {message}")]
    UnsupportedConstruct { message: String },

    /// Two functions (or two local bindings) share a name.
    #[error("conflicting definitions for `{name}`")]
    NameConflict { name: String },

    /// A function was redeclared or redefined with a different signature.
    #[error("signature mismatch for function `{name}`: expected {expected}, found {found}")]
    SignatureMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// Native (or structural) verification rejected the module.
    #[error("verification failed: {message}")]
    VerificationFailed { message: String },

    /// The interpreter was asked to run a function that does not exist
    /// or has no body.
    #[error("undefined entry point `{name}`")]
    UndefinedEntryPoint { name: String },

    /// The native code-generation library could not be loaded. Fatal:
    /// no backend operation is possible without it.
    #[error("failed to load native library: {message}")]
    LibraryLoad { message: String },

    /// The external toolchain (assembler/linker) failed.
    #[error("toolchain error: {message}")]
    Toolchain { message: String },

    /// The interpreter hit a runtime fault (bad address, width
    /// mismatch, call depth).
    #[error("runtime trap: {message}")]
    Trap { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("internal compiler error: {message}")]
    InternalError { message: String },
}

impl CompilerError {
    /// Create an unsupported-construct error
    pub fn unsupported(message: impl Into<String>) -> Self {
        CompilerError::UnsupportedConstruct {
            message: message.into(),
        }
    }

    /// Create a name-conflict error
    pub fn name_conflict(name: impl Into<String>) -> Self {
        CompilerError::NameConflict { name: name.into() }
    }

    /// Create a runtime trap error
    pub fn trap(message: impl Into<String>) -> Self {
        CompilerError::Trap {
            message: message.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IoError {
            message: err.to_string(),
        }
    }
}

/// Convert from String (for simple error cases)
impl From<String> for CompilerError {
    fn from(message: String) -> Self {
        CompilerError::InternalError { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompilerError::unsupported("weird form `(frob)`");
        assert_eq!(err.to_string(), "unsupported construct: weird form `(frob)`");

        let err = CompilerError::SignatureMismatch {
            name: "puts".to_string(),
            expected: "i32 (i8*)".to_string(),
            found: "void (i8*)".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "signature mismatch for function `puts`: expected i32 (i8*), found void (i8*)"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: CompilerError = io.into();
        assert!(matches!(err, CompilerError::IoError { .. }));
    }
}
