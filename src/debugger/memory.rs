//! Word-wide tracee memory access via the tracing API's data-peek/poke
//! operations.

use crate::debugger::address::RelocatedAddress;
use crate::debugger::breakpoint::TraceeMemory;
use crate::debugger::error::Error;
use nix::libc::c_void;
use nix::sys;
use nix::unistd::Pid;

/// Read one machine word at `addr`. No alignment transformation, no
/// partial reads: the kernel either returns the whole word or an error.
pub fn read_word(pid: Pid, addr: RelocatedAddress) -> Result<u64, Error> {
    Ok(sys::ptrace::read(pid, addr.as_usize() as *mut c_void)? as u64)
}

/// Write one machine word at `addr`.
pub fn write_word(pid: Pid, addr: RelocatedAddress, value: u64) -> Result<(), Error> {
    unsafe {
        sys::ptrace::write(pid, addr.as_usize() as *mut c_void, value as *mut c_void)?;
    }
    Ok(())
}

/// A live tracee, addressed by its pid, seen as a word-wide memory.
pub struct Tracee(pub Pid);

impl TraceeMemory for Tracee {
    fn read_word(&self, addr: RelocatedAddress) -> Result<u64, Error> {
        read_word(self.0, addr)
    }

    fn write_word(&self, addr: RelocatedAddress, value: u64) -> Result<(), Error> {
        write_word(self.0, addr, value)
    }
}
