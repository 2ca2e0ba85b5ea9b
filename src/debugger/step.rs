//! Stepping primitives built on top of the execution controller's core
//! operations: step-in, step-over, step-out.

use crate::debugger::address::GlobalAddress;
use crate::debugger::error::Error;
use crate::debugger::{Debugger, StopReason};

impl Debugger {
    /// `step`: run until the source line changes, crossing into callees
    /// (the single step lands on the callee's first instruction, which
    /// already has a different line entry).
    pub fn step_in(&mut self) -> Result<StopReason, Error> {
        let start_pc = self.pc()?;
        self.function_at_pc(start_pc)?;
        let start = self.place_at_pc(start_pc)?;
        let start_key = (start.file.to_string(), start.line_number);

        loop {
            let reason = self.single_step_safe()?;
            if !matches!(reason, StopReason::SingleStep) {
                return Ok(reason);
            }

            let pc = self.pc()?;
            match self.place_at_pc(pc) {
                Ok(place) if place.file == start_key.0 && place.line_number == start_key.1 => {
                    continue
                }
                Ok(_) => return Ok(StopReason::SingleStep),
                Err(Error::NoLineEntry(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// `next`: install temporary guards at every other line of the
    /// current function plus the return address, continue, then remove
    /// every guard this call installed — regardless of which one (if
    /// any) was actually hit.
    ///
    /// A function with no line entries at all degenerates to
    /// [`Debugger::step_out`] (only the return guard fires).
    pub fn step_over(&mut self) -> Result<StopReason, Error> {
        let current_pc = self.pc()?;
        let func = self.function_at_pc(current_pc)?;
        let (low_pc, high_pc) = (func.low_pc, func.high_pc);
        let current = self.place_at_pc(current_pc)?;
        let current_addr = current.address.as_u64();

        let mut candidates = Vec::new();
        if let (Some(low), Some(high)) = (low_pc, high_pc) {
            if let Ok(mut place) = self.dwarf.line_at(GlobalAddress::from(low as usize)) {
                loop {
                    if place.address.as_u64() >= high {
                        break;
                    }
                    if place.address.as_u64() != current_addr {
                        candidates.push(self.to_runtime(place.address));
                    }
                    match place.next() {
                        Some(next) => place = next,
                        None => break,
                    }
                }
            }
        }

        let mut installed = Vec::new();
        for addr in candidates {
            if self.install_guard(addr)? {
                installed.push(addr);
            }
        }

        if let Ok(ret_addr) = self.return_address() {
            if self.install_guard(ret_addr)? {
                installed.push(ret_addr);
            }
        }

        let result = self.continue_execution();

        for addr in installed {
            self.remove_breakpoint(addr)?;
        }

        result
    }

    /// `finish`: install a temporary guard at the return address (unless
    /// one is already there), continue, remove the guard on exit.
    pub fn step_out(&mut self) -> Result<StopReason, Error> {
        let current_pc = self.pc()?;
        self.function_at_pc(current_pc)?;
        let ret_addr = self.return_address()?;
        let installed = self.install_guard(ret_addr)?;

        let result = self.continue_execution();

        if installed {
            self.remove_breakpoint(ret_addr)?;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    // Stepping primitives need a live tracee and a compiled fixture
    // binary with known DWARF, so are exercised by integration tests
    // against a real tracee, not here.
}
