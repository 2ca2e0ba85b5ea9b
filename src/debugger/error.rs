//! Debugger error taxonomy.
//!
//! Every operation the controller performs on behalf of the dispatcher
//! returns `Result<_, Error>`. Only [`Error::TraceeGone`] ends the command
//! loop; every other variant is printed as a one-line diagnostic and the
//! prompt returns, leaving the tracee's and the breakpoint table's state
//! untouched.

use crate::debugger::address::GlobalAddress;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tracee I/O failed: {0}")]
    TraceeIo(#[source] nix::Error),
    #[error("waitpid failed: {0}")]
    Waitpid(#[source] nix::Error),
    #[error("no function at address {0}")]
    NoFunction(GlobalAddress),
    #[error("no line entry at address {0}")]
    NoLineEntry(GlobalAddress),
    #[error("unknown register: {0}")]
    UnknownRegister(String),
    #[error("bad command: {0}")]
    BadCommand(String),
    #[error("debugee process exited")]
    TraceeGone,

    #[error("failed to open executable: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse object file: {0}")]
    ObjParsing(#[from] object::Error),
    #[error("failed to parse DWARF data: {0}")]
    DwarfParsing(#[from] gimli::Error),
    #[error("failed to read /proc/<pid>/maps: {0}")]
    ProcMaps(String),
}

impl Error {
    /// Whether this error should end the command loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::TraceeGone)
    }
}

impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Self {
        Error::TraceeIo(e)
    }
}
