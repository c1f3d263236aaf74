//! Launch error types

use mpirt_platform::PlatformTag;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the native program
#[derive(Debug, Error)]
pub enum KernelError {
    /// The program could not be started at all
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        /// Program that was executed
        program: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The output file could not be opened
    #[error("cannot open output file {}: {source}", path.display())]
    Output {
        /// Requested output path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited non-zero
    #[error("native program exited with code {code}{}", tail_suffix(stderr_tail))]
    Failed {
        /// Exit code, `128 + signal` for signal deaths on Unix
        code: i32,
        /// Last lines the program wrote to stderr
        stderr_tail: Vec<String>,
    },
}

fn tail_suffix(tail: &[String]) -> String {
    match tail.last() {
        Some(line) => format!(": {}", line),
        None => String::new(),
    }
}

impl KernelError {
    /// Exit code the process should terminate with
    pub fn exit_code(&self) -> i32 {
        match self {
            KernelError::Failed { code, .. } => *code,
            _ => 1,
        }
    }

    /// Text used for failure classification
    pub fn failure_text(&self) -> String {
        match self {
            KernelError::Failed { stderr_tail, .. } if !stderr_tail.is_empty() => {
                stderr_tail.join("\n")
            }
            other => other.to_string(),
        }
    }
}

/// Errors from the parallel launcher
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Parallel execution was required but no orchestrator exists
    #[error(
        "no MPI orchestrator found for {platform} and strict parallel mode is enabled; \
         install MPI or run with -n 1"
    )]
    NoOrchestrator {
        /// Resolved platform
        platform: PlatformTag,
    },

    /// A child process could not be created
    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        /// Program that was executed
        program: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The native program failed
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Result type for launcher operations
pub type LaunchResult<T> = Result<T, LaunchError>;

impl LaunchError {
    /// Create a spawn error
    pub fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LaunchError::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Exit code the process should terminate with
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::NoOrchestrator { .. } => crate::launcher::STRICT_PARALLEL_EXIT_CODE,
            LaunchError::Spawn { .. } => 1,
            LaunchError::Kernel(e) => e.exit_code(),
        }
    }

    /// Check if this is a spawn failure (as opposed to a child exit status)
    pub fn is_spawn_failure(&self) -> bool {
        matches!(
            self,
            LaunchError::Spawn { .. } | LaunchError::Kernel(KernelError::Spawn { .. })
        )
    }
}
