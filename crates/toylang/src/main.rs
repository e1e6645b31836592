//! Toylang CLI
//!
//! Runs a script when given a path, otherwise starts the REPL. Mounts the
//! standard library (when discoverable next to the executable) before
//! either.

mod repl;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use toylang_interp::{DebugFlags, Interpreter};
use toylang_lexer::Source;

#[derive(Parser)]
#[command(name = "toylang")]
#[command(version)]
#[command(about = "Toylang interpreter - a small dynamically-typed scripting language")]
struct Cli {
    /// Script to run; starts a REPL when omitted
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Print the value of every expression statement
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to open {path}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Execution failed")]
    Execution,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut interpreter = Interpreter::new();
    if cli.verbose {
        interpreter.debug |= DebugFlags::PRINT_STMT_EXPRS;
        println!("[Debug] Verbose mode enabled");
    }
    mount_stdlib(&mut interpreter);

    let result = match cli.script {
        Some(path) => run_script(&mut interpreter, &path),
        None => {
            repl::run(&mut interpreter);
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run_script(interpreter: &mut Interpreter, path: &Path) -> Result<(), CliError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Open {
        path: display.clone(),
        source,
    })?;
    if interpreter.execute_or_evaluate(Source::new(&display, &text)) {
        Ok(())
    } else {
        Err(CliError::Execution)
    }
}

/// Walks the executable's ancestors for a `stdlib/std.tl` (also
/// `toylang/stdlib/std.tl`), mounts what it finds, and imports it.
fn mount_stdlib(interpreter: &mut Interpreter) {
    let Ok(exe) = std::env::current_exe() else {
        return;
    };
    if let Some(dir) = exe.parent() {
        interpreter.media.mount(dir);
    }
    let Some(stdlib) = find_stdlib(&exe) else {
        return;
    };
    interpreter.media.mount(&stdlib);
    interpreter.execute(Source::anonymous("import \"std.tl\";"));
}

fn find_stdlib(exe: &Path) -> Option<PathBuf> {
    for dir in exe.ancestors() {
        for candidate in [dir.join("stdlib"), dir.join("toylang/stdlib")] {
            if candidate.join("std.tl").is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
