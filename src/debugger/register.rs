//! Register file: enumerates architectural registers, maps names and
//! DWARF register numbers to slots in the kernel's register block, and
//! reads/writes that block via the tracing API.
//!
//! The kernel exposes a tracee's general-purpose registers as one
//! contiguous struct (`GETREGS`/`SETREGS`): reading a single register
//! costs exactly as much as reading all of them, so [`dump`] is a single
//! fetch rather than one `ptrace` call per register.

use crate::debugger::error::Error;
use nix::libc::user_regs_struct;
use nix::sys;
use nix::unistd::Pid;
use once_cell::sync::Lazy;
use strum_macros::{Display, EnumString};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rdi,
    Rsi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rip,
    Eflags,
    Cs,
    OrigRax,
    FsBase,
    GsBase,
    Fs,
    Gs,
    Ss,
    Ds,
    Es,
}

/// One entry of the fixed, ordered register descriptor table.
///
/// `dwarf_id` follows the System V x86-64 ABI's DWARF register number
/// convention; registers that convention doesn't assign a number to use
/// `-1` and are reachable only [`by_name`], never [`by_dwarf_id`].
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub register: Register,
    pub dwarf_id: i32,
}

/// The canonical, ordered register table: construction order here is the
/// dump order used by the `register dump` command.
pub static DESCRIPTORS: Lazy<Vec<RegisterDescriptor>> = Lazy::new(|| {
    use Register::*;
    vec![
        RegisterDescriptor { name: "rax", register: Rax, dwarf_id: 0 },
        RegisterDescriptor { name: "rdx", register: Rdx, dwarf_id: 1 },
        RegisterDescriptor { name: "rcx", register: Rcx, dwarf_id: 2 },
        RegisterDescriptor { name: "rbx", register: Rbx, dwarf_id: 3 },
        RegisterDescriptor { name: "rsi", register: Rsi, dwarf_id: 4 },
        RegisterDescriptor { name: "rdi", register: Rdi, dwarf_id: 5 },
        RegisterDescriptor { name: "rbp", register: Rbp, dwarf_id: 6 },
        RegisterDescriptor { name: "rsp", register: Rsp, dwarf_id: 7 },
        RegisterDescriptor { name: "r8", register: R8, dwarf_id: 8 },
        RegisterDescriptor { name: "r9", register: R9, dwarf_id: 9 },
        RegisterDescriptor { name: "r10", register: R10, dwarf_id: 10 },
        RegisterDescriptor { name: "r11", register: R11, dwarf_id: 11 },
        RegisterDescriptor { name: "r12", register: R12, dwarf_id: 12 },
        RegisterDescriptor { name: "r13", register: R13, dwarf_id: 13 },
        RegisterDescriptor { name: "r14", register: R14, dwarf_id: 14 },
        RegisterDescriptor { name: "r15", register: R15, dwarf_id: 15 },
        RegisterDescriptor { name: "rip", register: Rip, dwarf_id: -1 },
        RegisterDescriptor { name: "eflags", register: Eflags, dwarf_id: 49 },
        RegisterDescriptor { name: "cs", register: Cs, dwarf_id: 51 },
        RegisterDescriptor { name: "orig_rax", register: OrigRax, dwarf_id: -1 },
        RegisterDescriptor { name: "fs_base", register: FsBase, dwarf_id: 58 },
        RegisterDescriptor { name: "gs_base", register: GsBase, dwarf_id: 59 },
        RegisterDescriptor { name: "fs", register: Fs, dwarf_id: 54 },
        RegisterDescriptor { name: "gs", register: Gs, dwarf_id: 55 },
        RegisterDescriptor { name: "ss", register: Ss, dwarf_id: 52 },
        RegisterDescriptor { name: "ds", register: Ds, dwarf_id: 53 },
        RegisterDescriptor { name: "es", register: Es, dwarf_id: 50 },
    ]
});

/// Exact-match lookup of a register by its architectural name.
pub fn reg_by_name(name: &str) -> Result<Register, Error> {
    DESCRIPTORS
        .iter()
        .find(|d| d.name == name)
        .map(|d| d.register)
        .ok_or_else(|| Error::UnknownRegister(name.to_string()))
}

/// Lookup of a register by its DWARF register number. Negative ids are
/// never assigned (see [`RegisterDescriptor::dwarf_id`]) and always fail.
pub fn reg_by_dwarf_id(id: i32) -> Result<Register, Error> {
    if id < 0 {
        return Err(Error::UnknownRegister(format!("dwarf register {id}")));
    }
    DESCRIPTORS
        .iter()
        .find(|d| d.dwarf_id == id)
        .map(|d| d.register)
        .ok_or_else(|| Error::UnknownRegister(format!("dwarf register {id}")))
}

/// The architectural name of a register. Total: every `Register` variant
/// has an entry in [`DESCRIPTORS`].
pub fn name_of(register: Register) -> &'static str {
    DESCRIPTORS
        .iter()
        .find(|d| d.register == register)
        .map(|d| d.name)
        .expect("every Register has a descriptor")
}

/// The DWARF register number of a register, or `-1` if the convention
/// doesn't assign one.
pub fn dwarf_id_of(register: Register) -> i32 {
    DESCRIPTORS
        .iter()
        .find(|d| d.register == register)
        .map(|d| d.dwarf_id)
        .expect("every Register has a descriptor")
}

/// A snapshot of the tracee's general-purpose register block, fetched
/// with one `PTRACE_GETREGS` call and written back with one
/// `PTRACE_SETREGS` call.
pub struct RegisterMap(user_regs_struct);

impl RegisterMap {
    /// Fetch the tracee's current register block.
    pub fn current(pid: Pid) -> Result<Self, Error> {
        Ok(Self(sys::ptrace::getregs(pid)?))
    }

    pub fn value(&self, register: Register) -> u64 {
        let r = &self.0;
        match register {
            Register::Rax => r.rax,
            Register::Rbx => r.rbx,
            Register::Rcx => r.rcx,
            Register::Rdx => r.rdx,
            Register::Rdi => r.rdi,
            Register::Rsi => r.rsi,
            Register::Rbp => r.rbp,
            Register::Rsp => r.rsp,
            Register::R8 => r.r8,
            Register::R9 => r.r9,
            Register::R10 => r.r10,
            Register::R11 => r.r11,
            Register::R12 => r.r12,
            Register::R13 => r.r13,
            Register::R14 => r.r14,
            Register::R15 => r.r15,
            Register::Rip => r.rip,
            Register::Eflags => r.eflags,
            Register::Cs => r.cs,
            Register::OrigRax => r.orig_rax,
            Register::FsBase => r.fs_base,
            Register::GsBase => r.gs_base,
            Register::Fs => r.fs,
            Register::Gs => r.gs,
            Register::Ss => r.ss,
            Register::Ds => r.ds,
            Register::Es => r.es,
        }
    }

    pub fn set_value(&mut self, register: Register, value: u64) {
        let r = &mut self.0;
        match register {
            Register::Rax => r.rax = value,
            Register::Rbx => r.rbx = value,
            Register::Rcx => r.rcx = value,
            Register::Rdx => r.rdx = value,
            Register::Rdi => r.rdi = value,
            Register::Rsi => r.rsi = value,
            Register::Rbp => r.rbp = value,
            Register::Rsp => r.rsp = value,
            Register::R8 => r.r8 = value,
            Register::R9 => r.r9 = value,
            Register::R10 => r.r10 = value,
            Register::R11 => r.r11 = value,
            Register::R12 => r.r12 = value,
            Register::R13 => r.r13 = value,
            Register::R14 => r.r14 = value,
            Register::R15 => r.r15 = value,
            Register::Rip => r.rip = value,
            Register::Eflags => r.eflags = value,
            Register::Cs => r.cs = value,
            Register::OrigRax => r.orig_rax = value,
            Register::FsBase => r.fs_base = value,
            Register::GsBase => r.gs_base = value,
            Register::Fs => r.fs = value,
            Register::Gs => r.gs = value,
            Register::Ss => r.ss = value,
            Register::Ds => r.ds = value,
            Register::Es => r.es = value,
        }
    }

    /// Write the (possibly modified) block back to the tracee.
    pub fn persist(self, pid: Pid) -> Result<(), Error> {
        Ok(sys::ptrace::setregs(pid, self.0)?)
    }
}

/// Read a single register from the tracee.
pub fn read(pid: Pid, register: Register) -> Result<u64, Error> {
    Ok(RegisterMap::current(pid)?.value(register))
}

/// Write a single register in the tracee.
pub fn write(pid: Pid, register: Register, value: u64) -> Result<(), Error> {
    let mut regs = RegisterMap::current(pid)?;
    regs.set_value(register, value);
    regs.persist(pid)
}

/// Dump every register in canonical descriptor order, in a single fetch.
pub fn dump(pid: Pid) -> Result<Vec<(&'static str, u64)>, Error> {
    let regs = RegisterMap::current(pid)?;
    Ok(DESCRIPTORS
        .iter()
        .map(|d| (d.name, regs.value(d.register)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_lookup_round_trips_for_every_descriptor() {
        for d in DESCRIPTORS.iter() {
            assert_eq!(reg_by_name(d.name).unwrap(), d.register);
            assert_eq!(name_of(d.register), d.name);
        }
    }

    #[test]
    fn dwarf_id_lookup_round_trips_for_assigned_ids() {
        for d in DESCRIPTORS.iter().filter(|d| d.dwarf_id >= 0) {
            assert_eq!(reg_by_dwarf_id(d.dwarf_id).unwrap(), d.register);
            assert_eq!(dwarf_id_of(d.register), d.dwarf_id);
        }
    }

    #[test]
    fn unknown_register_name_is_an_error() {
        assert!(matches!(
            reg_by_name("not_a_register"),
            Err(Error::UnknownRegister(_))
        ));
    }

    #[test]
    fn unknown_dwarf_id_is_an_error() {
        assert!(matches!(
            reg_by_dwarf_id(-1),
            Err(Error::UnknownRegister(_))
        ));
        assert!(matches!(
            reg_by_dwarf_id(999),
            Err(Error::UnknownRegister(_))
        ));
    }

    #[test]
    fn descriptor_table_has_no_duplicate_names() {
        let mut names: Vec<_> = DESCRIPTORS.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DESCRIPTORS.len());
    }
}
