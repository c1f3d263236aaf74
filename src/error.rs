//! Unified error type for mpirt.
//!
//! Wraps the per-crate errors so the binary has one type to report and one
//! place that decides the process exit code.

use mpirt_archive::PackageError;
use mpirt_launcher::{KernelError, LaunchError};
use thiserror::Error;

/// All mpirt errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Package archive inspection or injection failed
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Launching or running the native program failed
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for mpirt operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Exit code the process should terminate with.
    ///
    /// Native program and orchestrator codes pass through unchanged;
    /// strict parallel mode without an orchestrator exits 3; everything
    /// else exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Launch(e) => e.exit_code(),
            _ => 1,
        }
    }

    /// Check if archive selection found zero or several candidates.
    pub fn is_ambiguous_target(&self) -> bool {
        matches!(self, Error::Package(PackageError::NoUnambiguousTarget { .. }))
    }

    /// Check if a child process could not be created at all.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Error::Launch(e) if e.is_spawn_failure())
    }

    /// Native program failure, if this is one
    pub fn kernel_failure(&self) -> Option<&KernelError> {
        match self {
            Error::Launch(LaunchError::Kernel(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<KernelError> for Error {
    fn from(e: KernelError) -> Self {
        Error::Launch(LaunchError::Kernel(e))
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpirt_platform::PlatformTag;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_mapping() {
        let strict: Error = LaunchError::NoOrchestrator {
            platform: PlatformTag::LinuxX86_64,
        }
        .into();
        assert_eq!(strict.exit_code(), 3);

        let failed: Error = KernelError::Failed {
            code: 9,
            stderr_tail: vec![],
        }
        .into();
        assert_eq!(failed.exit_code(), 9);
        assert!(failed.kernel_failure().is_some());

        let ambiguous: Error = PackageError::NoUnambiguousTarget {
            dir: PathBuf::from("dist"),
            found: vec![],
        }
        .into();
        assert_eq!(ambiguous.exit_code(), 1);
        assert!(ambiguous.is_ambiguous_target());

        assert_eq!(Error::config("bad").exit_code(), 1);
    }

    #[test]
    fn test_display_is_transparent() {
        let err: Error = PackageError::missing_artifact("mpirun").into();
        assert_eq!(err.to_string(), PackageError::missing_artifact("mpirun").to_string());
    }
}
