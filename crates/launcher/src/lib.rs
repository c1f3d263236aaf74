//! Launch layer for mpirt
//!
//! Everything that happens between "the binary started" and "the native
//! program ran":
//!
//! ```text
//! main()
//!   │
//!   ├─ LibraryPathInjector::plan()   bundled lib/ + bin/ on the search path
//!   │
//!   └─ Launcher::run()
//!        Start ──► RunSerial ──────────────────────────────► Done
//!          │                                                  ▲
//!          └─► ResolveStrategy ─┬─► SpawnOrchestrated ────────┤
//!                               ├─► SpawnMultiprocess ────────┤
//!                               └─► RunSerial (warned) ───────┘
//! ```
//!
//! Process creation goes through the [`Spawner`] trait and the native
//! program through the [`Kernel`] trait, so the state machine is testable
//! without launching anything.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod console;
pub mod diagnose;
pub mod error;
pub mod kernel;
pub mod launcher;
pub mod libpath;
pub mod spawn;
pub mod strategy;

pub use console::Console;
pub use diagnose::{
    classify_failure, explain_failure, remediation, FailureClass, MPI_FAILURE_KEYWORDS,
    MPI_FAILURE_PREFIXES,
};
pub use error::{KernelError, LaunchError, LaunchResult};
pub use kernel::{Kernel, KernelInvocation, ProgramKernel};
pub use launcher::{
    LaunchOutcome, LaunchRequest, LaunchState, Launcher, LauncherOptions, INPUT_FLAG,
    NO_RESPAWN_ENV, NO_RESPAWN_FLAG, OUTPUT_FLAG, RUN_SUBCOMMAND, STRICT_PARALLEL_EXIT_CODE,
};
pub use libpath::LibraryPathInjector;
pub use spawn::{exit_code_of, ChildCommand, Spawner, SystemSpawner};
pub use strategy::{search_path, LaunchDecision, StrategyResolution, StrategyResolver};
