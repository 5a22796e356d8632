//! Sylph compiler driver
//!
//! Reads a file of expanded forms, builds and verifies the Module IR,
//! then either interprets it in-process or lowers it through the
//! native library and hands the textual IR to the system toolchain.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;
use sylph_backend::{lower_module, toolchain, LibLlvm, DEFAULT_LLVM_PATH};
use sylph_common::CompilerError;
use sylph_frontend::ir::verify_module;
use sylph_frontend::{compile_to_module, Module};
use sylph_interp::{run as interpret, RtValue};

#[derive(Parser)]
#[command(name = "sylphc")]
#[command(about = "Sylph compiler")]
#[command(version = "0.1.0")]
struct Cli {
    /// Input file of expanded forms
    input: PathBuf,

    /// Interpret the module instead of compiling it
    #[arg(short = 'r', long = "run")]
    run: bool,

    /// Where to write the textual native IR (defaults to the output
    /// path with an .ll extension)
    #[arg(long)]
    ir: Option<PathBuf>,

    /// Dump the Module IR as JSON to this path
    #[arg(long)]
    ir_json: Option<PathBuf>,

    /// Print the Module IR to stdout
    #[arg(long)]
    print_ir: bool,

    /// Output binary path
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Location of the native LLVM shared library
    #[arg(long, default_value = DEFAULT_LLVM_PATH)]
    llvm: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CompilerError> {
    let source = fs::read_to_string(&cli.input)?;
    let module_name = cli
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "module".to_string());

    let module = compile_to_module(&source, &module_name)?;
    verify_module(&module).map_err(|e| CompilerError::VerificationFailed {
        message: e.to_string(),
    })?;

    if cli.print_ir {
        println!("{module}");
    }
    if let Some(path) = &cli.ir_json {
        let json = serde_json::to_string_pretty(&module)
            .map_err(|e| CompilerError::InternalError {
                message: format!("cannot serialize module: {e}"),
            })?;
        fs::write(path, json)?;
        info!("wrote Module IR JSON to {}", path.display());
    }

    if cli.run {
        return run_interpreter(&module);
    }
    compile_native(cli, &module)
}

fn run_interpreter(module: &Module) -> Result<(), CompilerError> {
    let outcome = interpret(module, "main")?;
    match outcome.value {
        Some(RtValue::Int { value, .. }) => println!("{value}"),
        Some(other) => println!("{other:?}"),
        None => {}
    }
    Ok(())
}

fn compile_native(cli: &Cli, module: &Module) -> Result<(), CompilerError> {
    let lib = LibLlvm::load(&cli.llvm)?;
    let text = lower_module(&lib, module)?;

    let ir_path = cli
        .ir
        .clone()
        .unwrap_or_else(|| cli.output.with_extension("ll"));
    fs::write(&ir_path, &text)?;
    info!("wrote native IR to {}", ir_path.display());

    toolchain::compile_ir(&ir_path, &cli.output)?;
    info!("wrote binary to {}", cli.output.display());
    Ok(())
}
