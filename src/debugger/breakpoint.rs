//! Software breakpoints: a breakpoint owns one (address, saved byte,
//! enabled) tuple and installs/removes an `int3` trap by patching the
//! tracee's text segment.

use crate::debugger::address::RelocatedAddress;
use crate::debugger::error::Error;

/// The one-byte x86 software trap instruction.
const TRAP_OPCODE: u8 = 0xCC;

/// Word-wide access to a tracee's address space, serviced by the memory
/// I/O component. A trait so the breakpoint round-trip algorithm can be
/// exercised in tests against a fake tracee, without a live process.
pub trait TraceeMemory {
    fn read_word(&self, addr: RelocatedAddress) -> Result<u64, Error>;
    fn write_word(&self, addr: RelocatedAddress, value: u64) -> Result<(), Error>;
}

/// A single software breakpoint. Invariants:
/// - when `enabled`, the low byte at `addr` in the tracee is `0xCC` and
///   `saved_byte` holds the original byte;
/// - when disabled, the original byte is in place and `saved_byte` is
///   stale (never read while disabled).
pub struct Breakpoint {
    addr: RelocatedAddress,
    saved_byte: u8,
    enabled: bool,
}

impl Breakpoint {
    /// A breakpoint is always constructed disabled; `enable` installs it.
    pub fn new(addr: RelocatedAddress) -> Self {
        Self {
            addr,
            saved_byte: 0,
            enabled: false,
        }
    }

    pub fn addr(&self) -> RelocatedAddress {
        self.addr
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Read the word at `addr`, stash its low byte, splice in `0xCC`.
    pub fn enable(&mut self, mem: &impl TraceeMemory) -> Result<(), Error> {
        let word = mem.read_word(self.addr)?;
        self.saved_byte = (word & 0xff) as u8;
        let patched = (word & !0xffu64) | TRAP_OPCODE as u64;
        mem.write_word(self.addr, patched)?;
        self.enabled = true;
        Ok(())
    }

    /// Read the current word, splice `saved_byte` back into the low byte.
    pub fn disable(&mut self, mem: &impl TraceeMemory) -> Result<(), Error> {
        let word = mem.read_word(self.addr)?;
        let restored = (word & !0xffu64) | self.saved_byte as u64;
        mem.write_word(self.addr, restored)?;
        self.enabled = false;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// An in-memory stand-in for the tracee's address space, word-keyed.
    #[derive(Default)]
    pub(crate) struct FakeMemory(RefCell<HashMap<RelocatedAddress, u64>>);

    impl FakeMemory {
        pub(crate) fn with_word(addr: RelocatedAddress, word: u64) -> Self {
            let map = HashMap::from([(addr, word)]);
            Self(RefCell::new(map))
        }
    }

    impl TraceeMemory for FakeMemory {
        fn read_word(&self, addr: RelocatedAddress) -> Result<u64, Error> {
            Ok(*self.0.borrow().get(&addr).unwrap_or(&0))
        }

        fn write_word(&self, addr: RelocatedAddress, value: u64) -> Result<(), Error> {
            self.0.borrow_mut().insert(addr, value);
            Ok(())
        }
    }

    #[test]
    fn enable_patches_low_byte_and_preserves_the_rest() {
        let addr = RelocatedAddress::from(0x1000usize);
        let mem = FakeMemory::with_word(addr, 0x1122_3344_5566_7788);
        let mut bp = Breakpoint::new(addr);
        bp.enable(&mem).unwrap();
        assert!(bp.is_enabled());
        assert_eq!(mem.read_word(addr).unwrap(), 0x1122_3344_5566_77CC);
    }

    #[test]
    fn disable_restores_the_original_byte() {
        let addr = RelocatedAddress::from(0x1000usize);
        let mem = FakeMemory::with_word(addr, 0x1122_3344_5566_7788);
        let mut bp = Breakpoint::new(addr);
        bp.enable(&mem).unwrap();
        bp.disable(&mem).unwrap();
        assert!(!bp.is_enabled());
        assert_eq!(mem.read_word(addr).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn enable_disable_round_trip_leaves_the_tracee_word_unchanged() {
        let addr = RelocatedAddress::from(0x2000usize);
        let original = 0xdead_beef_cafe_babeu64;
        let mem = FakeMemory::with_word(addr, original);
        let mut bp = Breakpoint::new(addr);
        bp.enable(&mem).unwrap();
        bp.disable(&mem).unwrap();
        assert_eq!(mem.read_word(addr).unwrap(), original);
    }

    #[test]
    fn saved_byte_is_the_byte_that_was_there_before_the_trap() {
        let addr = RelocatedAddress::from(0x3000usize);
        let mem = FakeMemory::with_word(addr, 0x00);
        let mut bp = Breakpoint::new(addr);
        bp.enable(&mem).unwrap();
        assert_eq!(bp.saved_byte, 0x00);
    }
}
