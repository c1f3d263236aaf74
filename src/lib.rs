//! # mpirt
//!
//! Bootstrap and launch layer for a native scientific program that ships its
//! own MPI runtime.
//!
//! Three moments in the life of a package:
//!
//! 1. **Build time** - [`ArchiveInjector`] copies the build host's MPI runtime
//!    into the package archive under `internal_mpi/<platform>/`.
//! 2. **Process start** - [`LibraryPathInjector`] puts the bundled libraries
//!    on the loader search path before anything native is loaded.
//! 3. **Run time** - [`Launcher`] decides between the bundled orchestrator,
//!    a system one, a worker pool or a serial run, and supervises the result.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mpirt::prelude::*;
//!
//! // Build time
//! let report = ArchiveInjector::new(InjectOptions::new("wannier_tools"))
//!     .inject(Path::new("dist"))?;
//!
//! // Run time
//! let env = Environment::capture();
//! let layout = RuntimeLayout::current(Path::new("/opt/wt/wannier_tools"));
//! let launcher = Launcher::new(
//!     &layout,
//!     &env,
//!     LauncherOptions::new(std::env::current_exe()?),
//!     SystemSpawner,
//!     ProgramKernel::new("wt.x"),
//! );
//! let outcome = launcher.run(&LaunchRequest::new("wt.in").processes(4))?;
//! std::process::exit(outcome.exit_code);
//! ```

#![warn(missing_docs)]

mod error;

pub mod prelude;

pub use error::{Error, Result};

// Re-export the layer crates
pub use mpirt_archive as archive;
pub use mpirt_launcher as launcher;
pub use mpirt_platform as platform;

// Re-export main entry points
pub use mpirt_archive::{ArchiveInjector, InjectOptions, InjectReport, PackageReader};
pub use mpirt_launcher::{
    LaunchDecision, LaunchOutcome, LaunchRequest, Launcher, LauncherOptions, LibraryPathInjector,
    ProgramKernel, SystemSpawner,
};
pub use mpirt_platform::{Environment, PlatformTag, RuntimeLayout, RuntimeLocator};
