//! Orchestrator strategy resolution
//!
//! Decides how a parallel run is executed. Resolution order:
//!
//! 1. Orchestrator inside the bundled runtime tree
//! 2. Orchestrator on the host `PATH` (`mpiexec.exe` on Windows, `mpirun`
//!    then `mpiexec` elsewhere); a hit inside the bundled tree still counts
//!    as bundled
//! 3. Windows: a self-managed pool of worker processes
//! 4. Anything else: serial in-process run, with a warning
//!
//! The decision depends only on the layout, the environment handed in and
//! the filesystem, never on the live process environment.

use mpirt_platform::{first_existing, Environment, PlatformTag, RuntimeLayout, RuntimeLocator};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How a run is executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchDecision {
    /// Re-execute under the orchestrator shipped inside the package
    UseBundledOrchestrator(PathBuf),
    /// Re-execute under an orchestrator installed on the host
    UseSystemOrchestrator(PathBuf),
    /// Spawn worker processes directly (Windows without an orchestrator)
    UseMultiprocessFallback,
    /// Run the native program in this process
    RunSerialInProcess,
}

impl LaunchDecision {
    /// Orchestrator path, if the decision uses one
    pub fn orchestrator(&self) -> Option<&Path> {
        match self {
            LaunchDecision::UseBundledOrchestrator(p) | LaunchDecision::UseSystemOrchestrator(p) => {
                Some(p)
            }
            _ => None,
        }
    }

    /// Whether the bundled runtime drives the run
    pub fn is_bundled(&self) -> bool {
        matches!(self, LaunchDecision::UseBundledOrchestrator(_))
    }
}

/// A decision plus the degradation warning that came with it, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyResolution {
    /// Chosen strategy
    pub decision: LaunchDecision,
    /// Set when parallelism was requested but cannot be honored
    pub warning: Option<String>,
}

/// Resolves the launch strategy for one run
pub struct StrategyResolver<'a> {
    layout: &'a RuntimeLayout,
    env: &'a Environment,
}

impl<'a> StrategyResolver<'a> {
    /// Resolver over a layout and the environment to search `PATH` in
    pub fn new(layout: &'a RuntimeLayout, env: &'a Environment) -> Self {
        StrategyResolver { layout, env }
    }

    /// Choose how to run `process_count` processes
    pub fn resolve(&self, process_count: usize) -> StrategyResolution {
        let tag = self.layout.platform_tag;

        if let Some(path) = RuntimeLocator::bundled(self.layout).and_then(|l| l.locate_orchestrator()) {
            info!("Using bundled MPI orchestrator {}", path.display());
            return StrategyResolution {
                decision: LaunchDecision::UseBundledOrchestrator(path),
                warning: None,
            };
        }

        if let Some(path) = search_path(self.env, orchestrator_names(tag)) {
            let bundled = self
                .layout
                .bundled_root
                .as_ref()
                .is_some_and(|root| path.starts_with(root));
            let decision = if bundled {
                LaunchDecision::UseBundledOrchestrator(path)
            } else {
                LaunchDecision::UseSystemOrchestrator(path)
            };
            info!("Using MPI orchestrator from PATH: {:?}", decision);
            return StrategyResolution {
                decision,
                warning: None,
            };
        }

        if uses_windows_conventions(tag) {
            info!(
                "No MPI orchestrator found; starting {} worker processes directly",
                process_count
            );
            return StrategyResolution {
                decision: LaunchDecision::UseMultiprocessFallback,
                warning: None,
            };
        }

        StrategyResolution {
            decision: LaunchDecision::RunSerialInProcess,
            warning: Some(format!(
                "{} processes requested but no MPI orchestrator (mpirun/mpiexec) was found; \
                 running serially in a single process",
                process_count
            )),
        }
    }
}

/// Orchestrator executable names searched on `PATH`, in order
fn orchestrator_names(tag: PlatformTag) -> &'static [&'static str] {
    if uses_windows_conventions(tag) {
        &["mpiexec.exe"]
    } else {
        &["mpirun", "mpiexec"]
    }
}

fn uses_windows_conventions(tag: PlatformTag) -> bool {
    tag.is_windows() || (tag == PlatformTag::Unsupported && cfg!(windows))
}

/// Find the first of `names` on the `PATH` held by `env`.
///
/// Every name is tried across the whole `PATH` before moving to the next.
pub fn search_path(env: &Environment, names: &[&str]) -> Option<PathBuf> {
    let path = env.get("PATH")?;
    let dirs: Vec<PathBuf> = std::env::split_paths(path)
        .filter(|d| !d.as_os_str().is_empty())
        .collect();

    names.iter().find_map(|name| {
        let hit = first_existing(dirs.iter().map(|d| d.join(name)));
        if hit.is_none() {
            debug!("{} not on PATH", name);
        }
        hit
    })
}
