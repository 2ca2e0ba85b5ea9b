//! The debugger: owns the tracee handle and wires together the register
//! file, breakpoint table, memory I/O, DWARF resolver and execution
//! controller into one object the command dispatcher drives.

pub mod address;
pub mod breakpoint;
pub mod command;
pub mod dwarf;
pub mod error;
mod memory;
mod process;
pub mod register;
mod signal;
mod step;

use crate::debugger::address::{GlobalAddress, RelocatedAddress};
use crate::debugger::breakpoint::Breakpoint;
use crate::debugger::dwarf::{Die, DwarfContext, Place, Symbol};
use crate::debugger::error::Error;
use crate::debugger::memory::{self, Tracee};
use crate::debugger::process::{Child, Installed};
use crate::debugger::register::{self, Register};
pub use crate::debugger::signal::StopReason;

use nix::sys::ptrace;
use nix::unistd::Pid;
use object::{Object, ObjectKind};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// One tracee, its static debug info, its load bias and its breakpoint
/// table. Only one tracee per debugger instance.
pub struct Debugger {
    pid: Pid,
    program: PathBuf,
    dwarf: DwarfContext,
    /// Runtime base address minus DWARF base address; zero for non-PIE
    /// binaries.
    load_bias: usize,
    breakpoints: HashMap<RelocatedAddress, Breakpoint>,
    /// Kept alive for the debugger's lifetime; the DWARF resolver copies
    /// section data out of it eagerly at construction (see
    /// [`DwarfContext::new`]) so this is never read again, but the ELF
    /// image is specified as mapped read-only for as long as the
    /// debugger runs.
    #[allow(dead_code)]
    mmap: memmap2::Mmap,
}

impl Debugger {
    /// Spawn `program` with `args`, wait for the initial execve stop,
    /// then compute the load bias.
    pub fn launch(program: impl AsRef<Path>, args: Vec<String>) -> Result<Self, Error> {
        let program = program.as_ref().to_path_buf();
        let installed: Child<Installed> =
            Child::new(program.to_string_lossy(), args.clone()).install()?;
        let pid = installed.pid();

        let file = File::open(&program)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let object = object::File::parse(&*mmap)?;
        let dwarf = DwarfContext::new(&object)?;
        let is_pie = object.kind() == ObjectKind::Dynamic;

        let load_bias = if is_pie {
            let maps = proc_maps::get_process_maps(pid.as_raw())
                .map_err(|e| Error::ProcMaps(e.to_string()))?;
            maps.first().map(|m| m.start()).unwrap_or(0)
        } else {
            0
        };

        log::debug!(target: "debugger", "tracee {pid} started, load bias {load_bias:#x}");

        Ok(Self {
            pid,
            program,
            dwarf,
            load_bias,
            breakpoints: HashMap::new(),
            mmap,
        })
    }

    pub fn program_path(&self) -> &Path {
        &self.program
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    fn tracee(&self) -> Tracee {
        Tracee(self.pid)
    }

    fn to_runtime(&self, addr: GlobalAddress) -> RelocatedAddress {
        addr.to_runtime(self.load_bias)
    }

    fn to_dwarf(&self, addr: RelocatedAddress) -> GlobalAddress {
        addr.to_global(self.load_bias)
    }

    /// The instruction pointer of the (only) tracee thread.
    pub fn pc(&self) -> Result<RelocatedAddress, Error> {
        Ok(RelocatedAddress::from(register::read(
            self.pid,
            Register::Rip,
        )?))
    }

    /// The return address of the current stack frame, read from
    /// `*(rbp + 8)` per the standard x86-64 frame layout.
    fn return_address(&self) -> Result<RelocatedAddress, Error> {
        let rbp = register::read(self.pid, Register::Rbp)?;
        let saved_ret = self.read_word(RelocatedAddress::from(rbp + 8))?;
        Ok(RelocatedAddress::from(saved_ret))
    }

    // ---- breakpoints ----

    /// Install an (enabled) breakpoint at a runtime address. Idempotent:
    /// a second call at the same address is a no-op, since at most one
    /// breakpoint exists per address.
    pub fn set_breakpoint_at_addr(&mut self, addr: RelocatedAddress) -> Result<(), Error> {
        if self.breakpoints.contains_key(&addr) {
            return Ok(());
        }
        let mut bp = Breakpoint::new(addr);
        bp.enable(&self.tracee())?;
        log::debug!(target: "debugger", "breakpoint installed at {addr}");
        self.breakpoints.insert(addr, bp);
        Ok(())
    }

    pub fn set_breakpoint_by_function(
        &mut self,
        name: &str,
    ) -> Result<Vec<RelocatedAddress>, Error> {
        let addrs = self.dwarf.resolve_function(name, self.load_bias);
        for &addr in &addrs {
            self.set_breakpoint_at_addr(addr)?;
        }
        Ok(addrs)
    }

    pub fn set_breakpoint_by_source(
        &mut self,
        file: &str,
        line: u64,
    ) -> Result<Vec<RelocatedAddress>, Error> {
        let addrs = self.dwarf.resolve_source(file, line, self.load_bias);
        for &addr in &addrs {
            self.set_breakpoint_at_addr(addr)?;
        }
        Ok(addrs)
    }

    /// Install a breakpoint only if one isn't already there, reporting
    /// whether this call is the one that installed it — used by
    /// stepping operations to track which guards they must remove.
    fn install_guard(&mut self, addr: RelocatedAddress) -> Result<bool, Error> {
        if self.breakpoints.contains_key(&addr) {
            return Ok(false);
        }
        self.set_breakpoint_at_addr(addr)?;
        Ok(true)
    }

    fn remove_breakpoint(&mut self, addr: RelocatedAddress) -> Result<(), Error> {
        if let Some(mut bp) = self.breakpoints.remove(&addr) {
            if bp.is_enabled() {
                bp.disable(&self.tracee())?;
            }
        }
        Ok(())
    }

    // ---- memory ----

    pub fn read_word(&self, addr: RelocatedAddress) -> Result<u64, Error> {
        memory::read_word(self.pid, addr)
    }

    pub fn write_word(&self, addr: RelocatedAddress, value: u64) -> Result<(), Error> {
        memory::write_word(self.pid, addr, value)
    }

    // ---- registers ----

    pub fn read_register(&self, name: &str) -> Result<u64, Error> {
        register::read(self.pid, register::reg_by_name(name)?)
    }

    pub fn write_register(&self, name: &str, value: u64) -> Result<(), Error> {
        register::write(self.pid, register::reg_by_name(name)?, value)
    }

    pub fn dump_registers(&self) -> Result<Vec<(&'static str, u64)>, Error> {
        register::dump(self.pid)
    }

    // ---- symbols & source resolution ----

    pub fn lookup_symbol(&self, name: &str) -> Vec<&Symbol> {
        self.dwarf.lookup_symbol(name)
    }

    pub fn place_at_pc(&self, pc: RelocatedAddress) -> Result<Place<'_>, Error> {
        self.dwarf.line_at(self.to_dwarf(pc))
    }

    pub fn function_at_pc(&self, pc: RelocatedAddress) -> Result<&Die, Error> {
        self.dwarf.function_at(self.to_dwarf(pc))
    }

    // ---- execution controller core ----

    /// `continue`: step over a breakpoint at the current PC if there is
    /// one, then resume the tracee and wait for its next stop.
    pub fn continue_execution(&mut self) -> Result<StopReason, Error> {
        self.step_over_breakpoint()?;
        ptrace::cont(self.pid, None).map_err(Error::TraceeIo)?;
        signal::wait_for_stop(self.pid)
    }

    /// If PC sits on an enabled breakpoint, disable it, single-step past
    /// it, then re-enable it — leaving the breakpoint logically armed
    /// for the next traversal. Returns the stop reason of the step it
    /// actually performed, if any.
    fn step_over_breakpoint(&mut self) -> Result<Option<StopReason>, Error> {
        let pc = self.pc()?;
        let is_enabled = self
            .breakpoints
            .get(&pc)
            .map(Breakpoint::is_enabled)
            .unwrap_or(false);
        if !is_enabled {
            return Ok(None);
        }

        let tracee = self.tracee();
        self.breakpoints.get_mut(&pc).unwrap().disable(&tracee)?;
        ptrace::step(self.pid, None).map_err(Error::TraceeIo)?;
        let reason = signal::wait_for_stop(self.pid)?;
        self.breakpoints.get_mut(&pc).unwrap().enable(&tracee)?;
        Ok(Some(reason))
    }

    /// Single-step, assuming PC is known not to sit on a breakpoint.
    fn single_step_raw(&mut self) -> Result<StopReason, Error> {
        ptrace::step(self.pid, None).map_err(Error::TraceeIo)?;
        signal::wait_for_stop(self.pid)
    }

    /// Single-step regardless of whether PC is currently on a
    /// breakpoint.
    pub fn single_step_safe(&mut self) -> Result<StopReason, Error> {
        match self.step_over_breakpoint()? {
            Some(reason) => Ok(reason),
            None => self.single_step_raw(),
        }
    }
}
