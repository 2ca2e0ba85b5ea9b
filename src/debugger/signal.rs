//! Stop classification.
//!
//! After any tracing operation that resumes the tracee, the controller
//! blocks in [`wait_for_stop`] for that child. This module only
//! classifies *why* the tracee stopped; the execution controller decides
//! what to do about it (rewind PC, resolve a source line, print a
//! diagnostic).

use crate::debugger::address::RelocatedAddress;
use crate::debugger::error::Error;
use crate::debugger::register::{self, Register};
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

#[allow(unused)]
mod code {
    /// Sent by the kernel rather than by `kill()`/`tgkill()`.
    pub const SI_KERNEL: i32 = 0x80;
    /// `int3` executed.
    pub const TRAP_BRKPT: i32 = 0x1;
    /// Single-step completed.
    pub const TRAP_TRACE: i32 = 0x2;
}

/// Why the tracee is currently stopped.
#[derive(Debug)]
pub enum StopReason {
    /// A software breakpoint trap; PC has already been rewound to the
    /// instrumented instruction's address.
    Breakpoint(RelocatedAddress),
    /// A single-step completed; nothing to report.
    SingleStep,
    /// Some other `SIGTRAP` sub-code the kernel didn't document for us.
    OtherTrap(i32),
    /// `SIGSEGV`; the tracee remains stopped and may still be inspected.
    Segfault(i32),
    /// Any other signal delivered to the tracee.
    OtherSignal(Signal, i32),
}

/// Block until the tracee identified by `pid` stops or exits, then
/// classify the stop. Returns [`Error::TraceeGone`] once the tracee has
/// exited or was killed by a signal — the only error that ends the
/// command loop.
pub fn wait_for_stop(pid: Pid) -> Result<StopReason, Error> {
    loop {
        let status = waitpid(pid, None).map_err(Error::Waitpid)?;
        match status {
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => return Err(Error::TraceeGone),
            WaitStatus::Stopped(pid, Signal::SIGTRAP) => {
                let info = ptrace::getsiginfo(pid).map_err(Error::TraceeIo)?;
                return Ok(match info.si_code {
                    code::TRAP_BRKPT | code::SI_KERNEL => {
                        // the CPU has already advanced past the `int3` byte;
                        // rewind so PC points back at the instrumented
                        // instruction.
                        let past_trap = register::read(pid, Register::Rip)?;
                        let rewound = past_trap - 1;
                        register::write(pid, Register::Rip, rewound)?;
                        StopReason::Breakpoint(RelocatedAddress::from(rewound))
                    }
                    code::TRAP_TRACE => StopReason::SingleStep,
                    other => StopReason::OtherTrap(other),
                });
            }
            WaitStatus::Stopped(_, Signal::SIGSEGV) => {
                let info = ptrace::getsiginfo(pid).map_err(Error::TraceeIo)?;
                return Ok(StopReason::Segfault(info.si_code));
            }
            WaitStatus::Stopped(_, signal) => {
                let info = ptrace::getsiginfo(pid).map_err(Error::TraceeIo)?;
                return Ok(StopReason::OtherSignal(signal, info.si_code));
            }
            // PTRACE_EVENT stops and group-stops never happen to this
            // single, non-multi-threaded tracee; keep waiting defensively.
            other => {
                log::debug!(target: "debugger", "unexpected wait status: {other:?}");
                continue;
            }
        }
    }
}
