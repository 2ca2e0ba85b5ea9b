//! The interactive command loop: reads a line, dispatches it, reports
//! the tracee's new stop reason. Single-threaded
//! end to end — the tracee inherits the debugger's stdio directly, so
//! there is no background forwarding thread to coordinate with.

mod editor;
mod help;
pub mod view;

use crate::console::editor::create_editor;
use crate::console::view::SourceView;
use crate::debugger::address::RelocatedAddress;
use crate::debugger::command::{self, BreakTarget, Command, MemoryCommand, RegisterCommand};
use crate::debugger::error::Error;
use crate::debugger::{Debugger, StopReason};
use rustyline::error::ReadlineError;

const PROMPT: &str = "dbg>";

pub struct Console {
    debugger: Debugger,
    editor: editor::ConsoleEditor,
    view: SourceView,
}

impl Console {
    pub fn new(debugger: Debugger) -> rustyline::Result<Self> {
        Ok(Self {
            debugger,
            editor: create_editor()?,
            view: SourceView::new(),
        })
    }

    /// Run until the user quits, input reaches EOF, or the tracee goes
    /// away. Returns the process exit code.
    pub fn run(mut self) -> i32 {
        println!("tracing {}", self.debugger.program_path().display());

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "q" || line == "quit" {
                        return 0;
                    }
                    if line == "h" || line == "help" {
                        println!("{}", help::help_text());
                        continue;
                    }
                    match self.handle(line) {
                        Ok(()) => {}
                        Err(Error::TraceeGone) => {
                            println!("tracee exited");
                            return 0;
                        }
                        Err(e) => println!("error: {e}"),
                    }
                }
                Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => return 0,
                Err(e) => {
                    println!("error: {e}");
                    return 1;
                }
            }
        }
    }

    fn handle(&mut self, line: &str) -> Result<(), Error> {
        match command::parse(line)? {
            Command::Continue => {
                let reason = self.debugger.continue_execution()?;
                self.report_stop(reason);
            }
            Command::Break(target) => self.handle_break(target)?,
            Command::Register(cmd) => self.handle_register(cmd)?,
            Command::Memory(cmd) => self.handle_memory(cmd)?,
            Command::StepInstruction => {
                let reason = self.debugger.single_step_safe()?;
                self.report_stop(reason);
            }
            Command::StepIn => {
                let reason = self.debugger.step_in()?;
                self.report_stop(reason);
            }
            Command::StepOver => {
                let reason = self.debugger.step_over()?;
                self.report_stop(reason);
            }
            Command::StepOut => {
                let reason = self.debugger.step_out()?;
                self.report_stop(reason);
            }
            Command::Symbol(name) => self.handle_symbol(&name),
        }
        Ok(())
    }

    fn handle_break(&mut self, target: BreakTarget) -> Result<(), Error> {
        match target {
            BreakTarget::Address(addr) => {
                let addr = RelocatedAddress::from(addr);
                self.debugger.set_breakpoint_at_addr(addr)?;
                println!("breakpoint set at {addr}");
            }
            BreakTarget::Source(file, line) => {
                let addrs = self.debugger.set_breakpoint_by_source(&file, line)?;
                self.print_breakpoint_addrs(&addrs, &file, line);
            }
            BreakTarget::Function(name) => {
                let addrs = self.debugger.set_breakpoint_by_function(&name)?;
                self.print_breakpoint_addrs(&addrs, &name, 0);
            }
        }
        Ok(())
    }

    fn print_breakpoint_addrs(&self, addrs: &[RelocatedAddress], label: &str, line: u64) {
        if addrs.is_empty() {
            println!("no match for {label}");
            return;
        }
        for addr in addrs {
            if line > 0 {
                println!("breakpoint set at {addr} ({label}:{line})");
            } else {
                println!("breakpoint set at {addr} ({label})");
            }
        }
    }

    fn handle_register(&mut self, cmd: RegisterCommand) -> Result<(), Error> {
        match cmd {
            RegisterCommand::Dump => {
                for (name, value) in self.debugger.dump_registers()? {
                    println!("{name:10} {value:#018x}");
                }
            }
            RegisterCommand::Read(name) => {
                let value = self.debugger.read_register(&name)?;
                println!("{value}");
            }
            RegisterCommand::Write(name, value) => {
                self.debugger.write_register(&name, value)?;
            }
        }
        Ok(())
    }

    fn handle_memory(&mut self, cmd: MemoryCommand) -> Result<(), Error> {
        match cmd {
            MemoryCommand::Read(addr) => {
                let value = self.debugger.read_word(RelocatedAddress::from(addr))?;
                println!("{value}");
            }
            MemoryCommand::Write(addr, value) => {
                self.debugger.write_word(RelocatedAddress::from(addr), value)?;
            }
        }
        Ok(())
    }

    fn handle_symbol(&self, name: &str) {
        let symbols = self.debugger.lookup_symbol(name);
        if symbols.is_empty() {
            println!("no symbol named {name}");
        }
        for symbol in symbols {
            println!("{} {} {}", symbol.name, symbol.kind, symbol.addr);
        }
    }

    fn report_stop(&self, reason: StopReason) {
        match reason {
            StopReason::Breakpoint(addr) => {
                println!("breakpoint hit at {addr}");
                self.print_source(addr);
            }
            StopReason::SingleStep => {
                if let Ok(pc) = self.debugger.pc() {
                    self.print_source(pc);
                }
            }
            StopReason::OtherTrap(code) => println!("trap (code {code})"),
            StopReason::Segfault(code) => println!("segfault: {code}"),
            StopReason::OtherSignal(signal, code) => println!("signal {signal}: {code}"),
        }
    }

    fn print_source(&self, addr: RelocatedAddress) {
        if let Ok(place) = self.debugger.place_at_pc(addr) {
            match self.view.render(&place) {
                Ok(text) => print!("{text}"),
                Err(e) => println!("error: {e}"),
            }
        }
    }
}
