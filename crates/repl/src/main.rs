//! aria - the Aria interpreter CLI
//!
//! Usage:
//!   aria                # interactive REPL
//!   aria script.aria    # run a script
//!
//! Exit codes follow the BSD sysexits convention: 0 on success, 64 for bad
//! usage, 65 for compile errors, 70 for runtime errors, 74 when the script
//! file cannot be read.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser as ClapParser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use aria_runtime::{InterpretResult, Vm, VmConfig};

const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

#[derive(ClapParser)]
#[command(name = "aria")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aria interpreter - run .aria scripts or start a REPL", long_about = None)]
struct Cli {
    /// Script to run; starts a REPL when omitted
    script: Option<PathBuf>,

    /// Log each instruction as it executes (at trace level)
    #[arg(long)]
    trace: bool,

    /// Disassemble each compiled function before running it
    #[arg(long)]
    print_code: bool,

    /// Collect garbage at every allocation point
    #[arg(long)]
    stress_gc: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            // Help and version requests are not usage errors.
            let code = if error.use_stderr() { EX_USAGE } else { 0 };
            process::exit(code);
        }
    };

    init_tracing();

    let config = VmConfig::new()
        .with_trace_execution(cli.trace)
        .with_print_code(cli.print_code)
        .with_stress_gc(cli.stress_gc);
    let mut vm = Vm::with_config(config);

    match cli.script {
        Some(path) => run_file(&mut vm, &path),
        None => repl(&mut vm),
    }
}

/// Log filter comes from `ARIA_LOG` (e.g. `aria::gc=debug,aria::vm=trace`),
/// defaulting to warnings only. Logs go to stderr so program output stays
/// clean on stdout.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("ARIA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_file(vm: &mut Vm, path: &Path) -> ! {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Could not read \"{}\": {}.", path.display(), error);
            process::exit(EX_IOERR);
        }
    };
    match vm.interpret(&source) {
        InterpretResult::Ok => process::exit(0),
        InterpretResult::CompileError => process::exit(EX_DATAERR),
        InterpretResult::RuntimeError => process::exit(EX_SOFTWARE),
    }
}

fn repl(vm: &mut Vm) -> ! {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("Could not start the line editor: {error}.");
            process::exit(EX_IOERR);
        }
    };

    loop {
        match editor.readline("aria> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                // Each line is its own program against the persistent VM;
                // errors are reported and the session continues.
                vm.interpret(&line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("Could not read input: {error}.");
                process::exit(EX_IOERR);
            }
        }
    }
    process::exit(0);
}
