//! Child process creation
//!
//! The launcher never calls `std::process::Command` directly; it hands a
//! fully built [`ChildCommand`] to a [`Spawner`]. A spawn error means the
//! child was never created. A child that ran and exited non-zero is a normal
//! `Ok(code)`.

use mpirt_platform::Environment;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use tracing::debug;

/// A child invocation: program, arguments and its complete environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommand {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments, not including the program
    pub args: Vec<OsString>,
    /// Complete environment of the child; nothing is inherited implicitly
    pub env: Environment,
}

impl ChildCommand {
    /// Command with no arguments
    pub fn new(program: impl Into<PathBuf>, env: Environment) -> Self {
        ChildCommand {
            program: program.into(),
            args: Vec::new(),
            env,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).env_clear().envs(self.env.iter());
        cmd
    }
}

/// Creates child processes and waits for them
pub trait Spawner {
    /// Run one child to completion and return its exit code
    fn run(&self, cmd: &ChildCommand) -> io::Result<i32>;

    /// Run all children concurrently and return their results in order.
    ///
    /// The default runs them one after another.
    fn run_all(&self, cmds: &[ChildCommand]) -> Vec<io::Result<i32>> {
        cmds.iter().map(|cmd| self.run(cmd)).collect()
    }
}

/// Spawner backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn run(&self, cmd: &ChildCommand) -> io::Result<i32> {
        debug!("Spawning {} {:?}", cmd.program.display(), cmd.args);
        let status = cmd.to_command().status()?;
        Ok(exit_code_of(status))
    }

    fn run_all(&self, cmds: &[ChildCommand]) -> Vec<io::Result<i32>> {
        // Start everything first, then join in order
        let children: Vec<io::Result<Child>> = cmds
            .iter()
            .map(|cmd| {
                debug!("Spawning {} {:?}", cmd.program.display(), cmd.args);
                cmd.to_command().spawn()
            })
            .collect();

        children
            .into_iter()
            .map(|child| child.and_then(|mut c| c.wait()).map(exit_code_of))
            .collect()
    }
}

/// Exit code of a finished child.
///
/// Signal deaths on Unix map to `128 + signal`, the shell convention.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
