//! Convenient imports for mpirt.
//!
//! ```ignore
//! use mpirt::prelude::*;
//!
//! let layout = RuntimeLayout::current(Path::new("/opt/wt/wannier_tools"));
//! let plan = LibraryPathInjector::plan(&layout, &Environment::capture());
//! ```

// Error handling
pub use crate::error::{Error, Result};

// Platform
pub use mpirt_platform::{
    is_primary, resolve_rank, EnvOverride, Environment, PlatformTag, RuntimeArtifactSet,
    RuntimeLayout, RuntimeLocator,
};

// Archive
pub use mpirt_archive::{ArchiveInjector, ArchiveListing, InjectOptions, InjectReport, PackageReader};

// Launch
pub use mpirt_launcher::{
    Console, Kernel, KernelInvocation, LaunchDecision, LaunchOutcome, LaunchRequest, Launcher,
    LauncherOptions, LibraryPathInjector, ProgramKernel, Spawner, SystemSpawner,
};

pub use std::path::{Path, PathBuf};
