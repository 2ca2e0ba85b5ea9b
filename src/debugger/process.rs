//! Tracee process spawning.
//!
//! A [`Child<Template>`] describes a not-yet-running tracee; `install`
//! forks, lets the child disable ASLR and request tracing, then stops it
//! with `SIGSTOP` so the debugger can attach before any user code runs.

use crate::debugger::error::Error;
use nix::sys;
use nix::sys::personality::Persona;
use nix::sys::ptrace::Options;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{fork, ForkResult, Pid};
use std::marker::PhantomData;
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Process lifecycle state.
pub trait State {}

/// Attached to the tracer via `ptrace` and stopped, ready to run.
pub struct Installed;
impl State for Installed {}

/// Not yet forked.
pub struct Template;
impl State for Template {}

pub struct Child<S: State> {
    pub program: String,
    args: Vec<String>,
    pid: Option<Pid>,
    _p: PhantomData<S>,
}

impl Child<Template> {
    pub fn new<ARGS: IntoIterator<Item = I>, I: Into<String>>(
        program: impl Into<String>,
        args: ARGS,
    ) -> Child<Template> {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            pid: None,
            _p: PhantomData,
        }
    }
}

impl Child<Installed> {
    pub fn pid(&self) -> Pid {
        self.pid.expect("installed child always has a pid")
    }
}

impl<S: State> Child<S> {
    /// Fork, disable ASLR in the child and request tracing before `exec`.
    /// `PTRACE_TRACEME` makes the kernel stop the child with `SIGTRAP` as
    /// it replaces its image, which is the first event the parent waits
    /// for below.
    pub fn install(&self) -> Result<Child<Installed>, Error> {
        let mut debugee_cmd = Command::new(&self.program);
        let debugee_cmd = debugee_cmd.args(&self.args);

        unsafe {
            debugee_cmd.pre_exec(move || {
                sys::personality::set(Persona::ADDR_NO_RANDOMIZE)?;
                sys::ptrace::traceme()?;
                Ok(())
            });
        }

        match unsafe { fork().expect("fork() error") } {
            ForkResult::Parent { child: pid } => {
                waitpid(pid, Some(WaitPidFlag::WSTOPPED)).map_err(Error::Waitpid)?;
                sys::ptrace::setoptions(pid, Options::PTRACE_O_EXITKILL)
                    .map_err(Error::TraceeIo)?;

                Ok(Child {
                    program: self.program.clone(),
                    args: self.args.clone(),
                    pid: Some(pid),
                    _p: PhantomData,
                })
            }
            ForkResult::Child => {
                let err = debugee_cmd.exec();
                panic!("run debugee fail with: {err}");
            }
        }
    }
}
