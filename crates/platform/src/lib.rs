//! Platform layer for mpirt
//!
//! This crate holds the pieces every other mpirt crate builds on:
//! - Platform resolution: (OS, architecture) → [`RuntimeLayout`]
//! - Runtime probing: first-found-wins search for MPI artifacts
//! - Environment modelling: pure construction of child environments
//! - Rank detection: "am I the primary process" under an orchestrator
//!
//! Nothing here mutates the process environment or fails the process.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod environment;
pub mod locator;
pub mod platform;
pub mod rank;

pub use environment::{EnvOverride, Environment};
pub use locator::{first_existing, RuntimeArtifactSet, RuntimeLocator, SearchList};
pub use platform::{PlatformTag, RuntimeLayout, INTERNAL_RUNTIME_DIR};
pub use rank::{is_primary, resolve_rank, RANK_VARIABLES};
