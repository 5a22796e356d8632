//! External toolchain invocation
//!
//! The backend stops at textual native IR; turning that into an
//! executable is delegated to a system compiler. Candidates are probed
//! in order and the first one present is used.

use std::path::Path;
use std::process::Command;

use log::{debug, warn};
use sylph_common::CompilerError;

const COMPILER_CANDIDATES: &[&str] = &["clang", "clang-19", "clang-18", "clang-17", "clang-16"];

/// Compile the textual IR at `ir_path` into the binary at `output`.
pub fn compile_ir(ir_path: &Path, output: &Path) -> Result<(), CompilerError> {
    for candidate in COMPILER_CANDIDATES {
        let result = Command::new(candidate)
            .arg(ir_path)
            .arg("-o")
            .arg(output)
            .arg("-Wno-override-module")
            .output();

        let command_output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("`{candidate}` not found, trying next candidate");
                continue;
            }
            Err(e) => {
                return Err(CompilerError::Toolchain {
                    message: format!("failed to run `{candidate}`: {e}"),
                })
            }
        };

        if command_output.status.success() {
            debug!("`{candidate}` wrote {}", output.display());
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&command_output.stderr);
        warn!("`{candidate}` failed: {}", stderr.trim());
        return Err(CompilerError::Toolchain {
            message: format!(
                "`{candidate}` exited with {}: {}",
                command_output.status,
                stderr.trim()
            ),
        });
    }
    Err(CompilerError::Toolchain {
        message: format!(
            "no native compiler found (tried {})",
            COMPILER_CANDIDATES.join(", ")
        ),
    })
}
