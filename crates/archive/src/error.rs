//! Package archive error types

use mpirt_platform::PlatformTag;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading, writing or injecting into package archives
#[derive(Debug, Error)]
pub enum PackageError {
    /// Zero or several candidate archives
    #[error(
        "no unambiguous target archive in {}: found {} candidate(s){}",
        dir.display(),
        found.len(),
        list_candidates(found)
    )]
    NoUnambiguousTarget {
        /// Directory that was searched
        dir: PathBuf,
        /// Every matching file
        found: Vec<PathBuf>,
    },

    /// The platform has no bundled runtime layout
    #[error("bundled MPI runtime is not available for platform {platform}")]
    UnsupportedPlatform {
        /// Resolved platform
        platform: PlatformTag,
    },

    /// A mandatory runtime artifact was not found on the build host
    #[error("required MPI artifact {name} not found; install the MPI runtime on the build host")]
    MissingArtifact {
        /// File name of the artifact
        name: String,
    },

    /// Copying a located artifact into the scratch tree failed
    #[error("failed to copy {}: {source}", from.display())]
    Copy {
        /// Source path
        from: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Unpacking the archive failed
    #[error("extraction failed: {0}")]
    Extract(String),

    /// Writing the new archive failed
    #[error("repack failed: {0}")]
    Repack(String),

    /// Archive structure error
    #[error("archive error: {0}")]
    Archive(String),

    /// Compression error
    #[error("compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for package archive operations
pub type PackageResult<T> = Result<T, PackageError>;

impl PackageError {
    /// Create an extraction error
    pub fn extract(msg: impl Into<String>) -> Self {
        PackageError::Extract(msg.into())
    }

    /// Create a repack error
    pub fn repack(msg: impl Into<String>) -> Self {
        PackageError::Repack(msg.into())
    }

    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        PackageError::Archive(msg.into())
    }

    /// Create a compression error
    pub fn compression(msg: impl Into<String>) -> Self {
        PackageError::Compression(msg.into())
    }

    /// Create a missing artifact error
    pub fn missing_artifact(name: impl Into<String>) -> Self {
        PackageError::MissingArtifact { name: name.into() }
    }
}

fn list_candidates(found: &[PathBuf]) -> String {
    if found.is_empty() {
        return String::new();
    }
    let names: Vec<String> = found
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();
    format!(" ({})", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguity_message_lists_candidates() {
        let err = PackageError::NoUnambiguousTarget {
            dir: PathBuf::from("dist"),
            found: vec![
                PathBuf::from("dist/wt-1.pkg.tar.zst"),
                PathBuf::from("dist/wt-2.pkg.tar.zst"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("found 2 candidate(s)"));
        assert!(msg.contains("wt-1.pkg.tar.zst, wt-2.pkg.tar.zst"));
    }

    #[test]
    fn test_no_candidates_message() {
        let err = PackageError::NoUnambiguousTarget {
            dir: PathBuf::from("dist"),
            found: vec![],
        };
        assert_eq!(
            err.to_string(),
            "no unambiguous target archive in dist: found 0 candidate(s)"
        );
    }
}
