//! Package Archives and MPI Runtime Injection
//!
//! This crate reads, writes and rewrites the distributable package archive,
//! and embeds a located system MPI runtime into it at build time.
//!
//! ## Archive Format
//!
//! Packages use the `.pkg.tar.zst` format - a zstd-compressed tar archive:
//!
//! ```text
//! <package>-<version>.pkg.tar.zst
//! └── <package>/
//!     ├── ...                      # program files
//!     └── internal_mpi/
//!         └── <platform_tag>/
//!             ├── bin/             # orchestrator, core library, auxiliaries
//!             ├── lib/
//!             └── include/
//! ```
//!
//! ## Usage
//!
//! Inject the host's MPI runtime into the single package in `dist/`:
//! ```ignore
//! let injector = ArchiveInjector::new(InjectOptions::new("wannier_tools"));
//! let report = injector.inject(Path::new("dist"))?;
//! ```
//!
//! List what ended up inside:
//! ```ignore
//! let listing = PackageReader::list(&report.archive)?;
//! ```
//!
//! ## Design Principles
//!
//! - **Unambiguous**: exactly one candidate archive, or nothing happens
//! - **Atomic**: the original is replaced by rename only after the new
//!   archive is completely written
//! - **Deterministic**: sorted entries, normalized headers, fixed compression
//!   level; the same inputs always produce the same bytes
//! - **Self-contained**: symlinks are materialized, dangling ones rejected

#![warn(clippy::all)]

mod error;
mod injector;
mod reader;
mod types;
mod writer;

pub use error::{PackageError, PackageResult};
pub use injector::ArchiveInjector;
pub use reader::PackageReader;
pub use types::{
    bundled_prefix, xxh3_hex, ArchiveListing, EntryInfo, InjectOptions, InjectReport,
    PACKAGE_EXTENSION, RUNTIME_SUBDIRS, ZSTD_LEVEL,
};
pub use writer::PackageWriter;
