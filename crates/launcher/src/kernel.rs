//! Native program invocation
//!
//! The numerical program is opaque to us: it reads its input file from the
//! working directory and writes results to stdout. [`ProgramKernel`] runs it
//! as a child process:
//!
//! - working directory: the input file's directory (child-scoped, the
//!   launcher's own cwd never changes)
//! - stdin: null
//! - stdout: the output file if one was requested, else inherited. Rank 0
//!   writes `<out>`, rank N writes `<out>.rankN`; each file is truncated
//! - stderr: copied line by line into the output file when there is one,
//!   else to our stderr; the last lines are retained for failure
//!   classification

use crate::error::KernelError;
use crate::spawn::exit_code_of;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Number of stderr lines kept for failure reports
pub const STDERR_TAIL_LINES: usize = 20;

/// One in-process run of the native program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInvocation {
    /// Input file
    pub input: PathBuf,
    /// Output file, `None` to inherit stdout
    pub output: Option<PathBuf>,
    /// Resolved rank; 0 when not running under an orchestrator
    pub rank: usize,
}

impl KernelInvocation {
    /// Directory the program runs in
    pub fn working_dir(&self) -> PathBuf {
        match self.input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// File this rank writes to: `<out>` for rank 0, `<out>.rankN` otherwise
    pub fn output_path(&self) -> Option<PathBuf> {
        let path = self.output.as_ref()?;
        if self.rank == 0 {
            return Some(path.clone());
        }
        let mut name = path.clone().into_os_string();
        name.push(format!(".rank{}", self.rank));
        Some(PathBuf::from(name))
    }
}

/// The native numerical program
pub trait Kernel {
    /// Run once to completion
    fn run(&self, invocation: &KernelInvocation) -> Result<(), KernelError>;
}

/// Kernel running an external executable
#[derive(Debug, Clone)]
pub struct ProgramKernel {
    program: PathBuf,
    args: Vec<OsString>,
    pass_input: bool,
}

impl ProgramKernel {
    /// Kernel for `program`, passing the input file name as last argument
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ProgramKernel {
            program: program.into(),
            args: Vec::new(),
            pass_input: true,
        }
    }

    /// Fixed arguments placed before the input file name
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Whether to append the input file name to the arguments
    pub fn pass_input(mut self, pass: bool) -> Self {
        self.pass_input = pass;
        self
    }

    /// Program this kernel runs
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn open_output(path: &Path) -> Result<File, KernelError> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| KernelError::Output {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl Kernel for ProgramKernel {
    fn run(&self, invocation: &KernelInvocation) -> Result<(), KernelError> {
        let cwd = invocation.working_dir();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stderr(Stdio::piped());
        if self.pass_input {
            if let Some(name) = invocation.input.file_name() {
                cmd.arg(name);
            }
        }
        let mut sink: Box<dyn Write> = match invocation.output_path() {
            Some(path) => {
                let file = Self::open_output(&path)?;
                let stderr_copy = file.try_clone().map_err(|source| KernelError::Output {
                    path: path.clone(),
                    source,
                })?;
                cmd.stdout(file);
                Box::new(stderr_copy)
            }
            None => {
                cmd.stdout(Stdio::inherit());
                Box::new(std::io::stderr())
            }
        };

        info!(
            rank = invocation.rank,
            "Running {} in {}",
            self.program.display(),
            cwd.display()
        );
        let mut child = cmd.spawn().map_err(|source| KernelError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = child.stderr.take() {
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                let _ = writeln!(sink, "{}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        let status = child.wait().map_err(|source| KernelError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        debug!("{} finished with {}", self.program.display(), status);

        if status.success() {
            Ok(())
        } else {
            Err(KernelError::Failed {
                code: exit_code_of(status),
                stderr_tail: tail.into_iter().collect(),
            })
        }
    }
}
