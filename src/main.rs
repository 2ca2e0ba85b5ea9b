//! Debugger application entry point.
//!
//! Parses `debugger <program-path> [program-args...]`, spawns the tracee,
//! computes its load bias and hands off to the interactive command loop.
//! Exit code `-1` (truncated to 255 by the process API) if no program
//! path is given; otherwise the exit code of the final command-loop read.

mod console;
mod debugger;

use clap::Parser;
use console::Console;
use debugger::Debugger;

/// A small source-level debugger for native x86-64 Linux executables.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the executable to debug (must be unstripped, built with
    /// DWARF debug info).
    program: Option<String>,

    /// Arguments passed through to the debugee.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    let Some(program) = args.program else {
        eprintln!("usage: dbgr <program-path> [program-args...]");
        std::process::exit(255);
    };

    match Debugger::launch(&program, args.args) {
        Ok(debugger) => {
            let console = match Console::new(debugger) {
                Ok(console) => console,
                Err(e) => {
                    eprintln!("failed to start command loop: {e}");
                    std::process::exit(1);
                }
            };
            std::process::exit(console.run());
        }
        Err(e) => {
            eprintln!("failed to launch {program}: {e}");
            std::process::exit(255);
        }
    }
}
