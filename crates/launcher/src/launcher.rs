//! Parallel launcher state machine
//!
//! ```text
//! Start
//!   ├── guard set, or process_count <= 1 ──────────────► RunSerial
//!   └── otherwise ──► ResolveStrategy
//!                       ├── orchestrator found ──► SpawnOrchestrated
//!                       ├── Windows, none found ─► SpawnMultiprocess
//!                       └── none found ──────────► RunSerial (warning)
//!                                                  or NoOrchestrator (strict)
//! SpawnOrchestrated / SpawnMultiprocess / RunSerial ──► Done(exit_code)
//! ```
//!
//! ## Re-entry Guard
//!
//! Every re-invocation of this binary carries both `--no-respawn` and
//! `MPIRT_NO_RESPAWN=1`. A process that sees either goes straight to
//! `RunSerial`, so each worker runs the native program exactly once and no
//! worker ever starts another orchestrator.

use crate::console::Console;
use crate::error::{LaunchError, LaunchResult};
use crate::kernel::{Kernel, KernelInvocation};
use crate::libpath::already_prepended;
use crate::spawn::{ChildCommand, Spawner};
use crate::strategy::{LaunchDecision, StrategyResolver};
use mpirt_platform::{resolve_rank, EnvOverride, Environment, RuntimeLayout};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Re-invocation Protocol
// ============================================================================

/// Subcommand a re-invoked child runs
pub const RUN_SUBCOMMAND: &str = "run";
/// Input file flag
pub const INPUT_FLAG: &str = "--input";
/// Output file flag
pub const OUTPUT_FLAG: &str = "--output";
/// Hidden flag marking a re-invoked child
pub const NO_RESPAWN_FLAG: &str = "--no-respawn";
/// Environment variable marking a re-invoked child
pub const NO_RESPAWN_ENV: &str = "MPIRT_NO_RESPAWN";
/// Exit code when strict parallel mode finds no orchestrator
pub const STRICT_PARALLEL_EXIT_CODE: i32 = 3;

// ============================================================================
// Request / Options / Outcome
// ============================================================================

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Input file
    pub input: PathBuf,
    /// Output file, `None` for stdout
    pub output: Option<PathBuf>,
    /// Requested process count
    pub process_count: usize,
    /// Re-entry guard from the command line
    pub suppress_respawn: bool,
}

impl LaunchRequest {
    /// Serial request for `input`
    pub fn new(input: impl Into<PathBuf>) -> Self {
        LaunchRequest {
            input: input.into(),
            output: None,
            process_count: 1,
            suppress_respawn: false,
        }
    }

    /// Set the output file
    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the process count
    pub fn processes(mut self, n: usize) -> Self {
        self.process_count = n;
        self
    }

    /// Mark as a re-invoked child
    pub fn no_respawn(mut self) -> Self {
        self.suppress_respawn = true;
        self
    }
}

/// Launcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherOptions {
    /// This executable, re-invoked under the orchestrator
    pub self_exe: PathBuf,
    /// Fail instead of degrading to serial when no orchestrator exists
    pub strict_parallel: bool,
    /// Extra orchestrator arguments placed after `-n <N>`
    pub orchestrator_args: Vec<String>,
}

impl LauncherOptions {
    /// Options re-invoking `self_exe`
    pub fn new(self_exe: impl Into<PathBuf>) -> Self {
        LauncherOptions {
            self_exe: self_exe.into(),
            strict_parallel: false,
            orchestrator_args: Vec::new(),
        }
    }

    /// Enable or disable strict parallel mode
    pub fn strict_parallel(mut self, strict: bool) -> Self {
        self.strict_parallel = strict;
        self
    }

    /// Set extra orchestrator arguments
    pub fn orchestrator_args(mut self, args: Vec<String>) -> Self {
        self.orchestrator_args = args;
        self
    }
}

/// States of one launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchState {
    /// Nothing decided yet
    Start,
    /// Choosing an orchestrator
    ResolveStrategy,
    /// Re-executing under an orchestrator
    SpawnOrchestrated,
    /// Running a worker pool directly
    SpawnMultiprocess,
    /// Running the native program in this process
    RunSerial,
    /// Finished with an exit code
    Done(i32),
}

/// Result of a completed launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Strategy that ran
    pub decision: LaunchDecision,
    /// Exit code to terminate with
    pub exit_code: i32,
    /// States visited, in order
    pub trace: Vec<LaunchState>,
}

impl LaunchOutcome {
    /// Whether the run succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// ============================================================================
// Launcher
// ============================================================================

/// Drives one run from request to exit code
pub struct Launcher<'a, S: Spawner, K: Kernel> {
    layout: &'a RuntimeLayout,
    env: &'a Environment,
    options: LauncherOptions,
    spawner: S,
    kernel: K,
}

impl<'a, S: Spawner, K: Kernel> Launcher<'a, S, K> {
    /// Launcher over a layout and the environment children are derived from
    pub fn new(
        layout: &'a RuntimeLayout,
        env: &'a Environment,
        options: LauncherOptions,
        spawner: S,
        kernel: K,
    ) -> Self {
        Launcher {
            layout,
            env,
            options,
            spawner,
            kernel,
        }
    }

    /// Run the state machine to completion
    pub fn run(&self, request: &LaunchRequest) -> LaunchResult<LaunchOutcome> {
        let console = Console::for_env(self.env);
        let mut decision = LaunchDecision::RunSerialInProcess;
        let mut trace = Vec::new();
        let mut state = LaunchState::Start;

        loop {
            trace.push(state.clone());
            state = match state {
                LaunchState::Start => {
                    if self.guard_set(request) || request.process_count <= 1 {
                        LaunchState::RunSerial
                    } else {
                        LaunchState::ResolveStrategy
                    }
                }
                LaunchState::ResolveStrategy => {
                    let resolution =
                        StrategyResolver::new(self.layout, self.env).resolve(request.process_count);
                    if let Some(msg) = &resolution.warning {
                        if self.options.strict_parallel {
                            return Err(LaunchError::NoOrchestrator {
                                platform: self.layout.platform_tag,
                            });
                        }
                        warn!("{}", msg);
                        console.warn(msg);
                    }
                    decision = resolution.decision;
                    match &decision {
                        LaunchDecision::UseBundledOrchestrator(_)
                        | LaunchDecision::UseSystemOrchestrator(_) => LaunchState::SpawnOrchestrated,
                        LaunchDecision::UseMultiprocessFallback => LaunchState::SpawnMultiprocess,
                        LaunchDecision::RunSerialInProcess => LaunchState::RunSerial,
                    }
                }
                LaunchState::SpawnOrchestrated => {
                    let cmd = self.orchestrated_command(&decision, request);
                    console.info(format!(
                        "Launching {} processes with {}",
                        request.process_count,
                        cmd.program.display()
                    ));
                    let code = self
                        .spawner
                        .run(&cmd)
                        .map_err(|e| LaunchError::spawn(&cmd.program, e))?;
                    info!("Orchestrator exited with code {}", code);
                    LaunchState::Done(code)
                }
                LaunchState::SpawnMultiprocess => {
                    console.info(format!(
                        "Launching {} worker processes without an MPI orchestrator",
                        request.process_count
                    ));
                    LaunchState::Done(self.run_pool(request)?)
                }
                LaunchState::RunSerial => {
                    let invocation = KernelInvocation {
                        input: request.input.clone(),
                        output: request.output.clone(),
                        rank: resolve_rank(self.env).unwrap_or(0),
                    };
                    self.kernel.run(&invocation)?;
                    LaunchState::Done(0)
                }
                LaunchState::Done(exit_code) => {
                    return Ok(LaunchOutcome {
                        decision,
                        exit_code,
                        trace,
                    });
                }
            };
        }
    }

    fn guard_set(&self, request: &LaunchRequest) -> bool {
        request.suppress_respawn || self.env.get_str(NO_RESPAWN_ENV) == Some("1")
    }

    /// `<orchestrator> -n N [extra] <self> run --input IN [--output OUT] --no-respawn`
    pub fn orchestrated_command(&self, decision: &LaunchDecision, request: &LaunchRequest) -> ChildCommand {
        let mut overrides = match decision {
            LaunchDecision::UseBundledOrchestrator(_) => bundled_overrides(self.layout, self.env),
            _ => Vec::new(),
        };
        overrides.push(EnvOverride::set(NO_RESPAWN_ENV, "1"));

        let program = decision
            .orchestrator()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.options.self_exe.clone());

        ChildCommand::new(program, self.env.with_overrides(&overrides))
            .arg("-n")
            .arg(request.process_count.to_string())
            .args(self.options.orchestrator_args.iter().map(OsString::from))
            .arg(self.options.self_exe.as_os_str())
            .args(self_args(request))
    }

    /// Commands for each pool worker, in rank order
    pub fn pool_commands(&self, request: &LaunchRequest) -> Vec<ChildCommand> {
        let n = request.process_count;
        (0..n)
            .map(|rank| {
                let mut overrides = vec![
                    EnvOverride::set("PMI_RANK", rank.to_string()),
                    EnvOverride::set("PMI_SIZE", n.to_string()),
                    EnvOverride::set(NO_RESPAWN_ENV, "1"),
                ];
                if let Some(bin) = self.layout.bundled_bin_dir().filter(|d| d.is_dir()) {
                    overrides.push(EnvOverride::prepend(
                        "PATH",
                        vec![bin],
                        self.layout.platform_tag.path_separator(),
                    ));
                }
                ChildCommand::new(&self.options.self_exe, self.env.with_overrides(&overrides))
                    .args(self_args(request))
            })
            .collect()
    }

    fn run_pool(&self, request: &LaunchRequest) -> LaunchResult<i32> {
        let cmds = self.pool_commands(request);
        let results = self.spawner.run_all(&cmds);

        let mut first_failure = None;
        for (rank, result) in results.into_iter().enumerate() {
            match result {
                Ok(0) => {}
                Ok(code) => {
                    warn!("Worker {} exited with code {}", rank, code);
                    first_failure.get_or_insert(code);
                }
                Err(e) => return Err(LaunchError::spawn(&self.options.self_exe, e)),
            }
        }
        Ok(first_failure.unwrap_or(0))
    }
}

/// Arguments re-invoking this binary as a guarded worker
fn self_args(request: &LaunchRequest) -> Vec<OsString> {
    let mut args = vec![
        OsString::from(RUN_SUBCOMMAND),
        OsString::from(INPUT_FLAG),
        request.input.clone().into_os_string(),
    ];
    if let Some(out) = &request.output {
        args.push(OsString::from(OUTPUT_FLAG));
        args.push(out.clone().into_os_string());
    }
    args.push(OsString::from(NO_RESPAWN_FLAG));
    args
}

/// Environment for a run driven by the bundled orchestrator.
///
/// The search variable is left alone when `env` already starts with the
/// bundled directories.
fn bundled_overrides(layout: &RuntimeLayout, env: &Environment) -> Vec<EnvOverride> {
    let mut overrides = Vec::new();
    let root = match &layout.bundled_root {
        Some(root) => root,
        None => return overrides,
    };

    if let Some(var) = layout.library_search_var {
        let dirs = layout.existing_library_dirs();
        let separator = layout.platform_tag.path_separator();
        if !dirs.is_empty() && !already_prepended(env.get_str(var), &dirs, separator) {
            overrides.push(EnvOverride::prepend(var, dirs, separator));
        }
    }

    if layout.platform_tag.is_windows() {
        overrides.push(EnvOverride::set("MSMPI_BIN", root.join("bin").into_os_string()));
    } else {
        overrides.push(EnvOverride::set("OPAL_PREFIX", root.clone().into_os_string()));
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use mpirt_platform::PlatformTag;
    use std::cell::RefCell;
    use std::ffi::OsStr;
    use std::fs;
    use std::io;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingSpawner {
        codes: Vec<i32>,
        calls: RefCell<Vec<ChildCommand>>,
    }

    impl Spawner for RecordingSpawner {
        fn run(&self, cmd: &ChildCommand) -> io::Result<i32> {
            let mut calls = self.calls.borrow_mut();
            let code = self.codes.get(calls.len()).copied().unwrap_or(0);
            calls.push(cmd.clone());
            Ok(code)
        }
    }

    #[derive(Default)]
    struct RecordingKernel {
        runs: RefCell<Vec<KernelInvocation>>,
    }

    impl Kernel for RecordingKernel {
        fn run(&self, invocation: &KernelInvocation) -> Result<(), KernelError> {
            self.runs.borrow_mut().push(invocation.clone());
            Ok(())
        }
    }

    fn bundled_layout(tag: PlatformTag, pkg: &Path) -> RuntimeLayout {
        let layout = RuntimeLayout::for_tag(tag, pkg);
        let root = layout.bundled_root.clone().unwrap();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::create_dir_all(root.join("bin")).unwrap();
        let orchestrator = if tag.is_windows() { "mpiexec.exe" } else { "mpirun" };
        fs::write(root.join("bin").join(orchestrator), b"#!").unwrap();
        layout
    }

    #[test]
    fn test_self_args_shape() {
        let req = LaunchRequest::new("case/wt.in").output("out.txt").processes(4);
        let args: Vec<String> = self_args(&req)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["run", "--input", "case/wt.in", "--output", "out.txt", "--no-respawn"]
        );
    }

    #[test]
    fn test_bundled_command_and_environment() {
        let pkg = tempdir().unwrap();
        let layout = bundled_layout(PlatformTag::LinuxX86_64, pkg.path());
        let env = Environment::from_vars([("LD_LIBRARY_PATH", "/usr/lib")]);
        let launcher = Launcher::new(
            &layout,
            &env,
            LauncherOptions::new("/opt/mpirt").orchestrator_args(vec!["--oversubscribe".into()]),
            RecordingSpawner::default(),
            RecordingKernel::default(),
        );

        let orch = layout.bundled_bin_dir().unwrap().join("mpirun");
        let req = LaunchRequest::new("wt.in").processes(4);
        let cmd = launcher.orchestrated_command(&LaunchDecision::UseBundledOrchestrator(orch.clone()), &req);

        assert_eq!(cmd.program, orch);
        let args: Vec<String> = cmd.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-n", "4", "--oversubscribe", "/opt/mpirt", "run", "--input", "wt.in", "--no-respawn"]
        );

        let root = layout.bundled_root.clone().unwrap();
        let search = cmd.env.get_str("LD_LIBRARY_PATH").unwrap();
        assert!(search.starts_with(root.join("lib").to_str().unwrap()));
        assert!(search.ends_with(":/usr/lib"));
        assert_eq!(cmd.env.get_str("OPAL_PREFIX"), root.to_str());
        assert_eq!(cmd.env.get_str(NO_RESPAWN_ENV), Some("1"));
    }

    #[test]
    fn test_windows_bundled_sets_msmpi_bin() {
        let pkg = tempdir().unwrap();
        let layout = bundled_layout(PlatformTag::WindowsAmd64, pkg.path());
        let overrides = bundled_overrides(&layout, &Environment::new());
        let env = Environment::new().with_overrides(&overrides);

        let bin = layout.bundled_bin_dir().unwrap();
        assert_eq!(env.get_str("MSMPI_BIN"), bin.to_str());
        assert!(env.get("OPAL_PREFIX").is_none());
        assert!(env.get_str("PATH").unwrap().contains(bin.to_str().unwrap()));
    }

    #[test]
    fn test_bundled_search_path_not_prepended_twice() {
        let pkg = tempdir().unwrap();
        let layout = bundled_layout(PlatformTag::LinuxX86_64, pkg.path());
        let root = layout.bundled_root.clone().unwrap();
        let current = format!(
            "{}:{}:/usr/lib",
            root.join("lib").display(),
            root.join("bin").display()
        );
        let env = Environment::from_vars([("LD_LIBRARY_PATH", current.as_str())]);
        let launcher = Launcher::new(
            &layout,
            &env,
            LauncherOptions::new("/opt/mpirt"),
            RecordingSpawner::default(),
            RecordingKernel::default(),
        );

        let orch = layout.bundled_bin_dir().unwrap().join("mpirun");
        let req = LaunchRequest::new("wt.in").processes(4);
        let cmd = launcher.orchestrated_command(&LaunchDecision::UseBundledOrchestrator(orch), &req);

        assert_eq!(cmd.env.get_str("LD_LIBRARY_PATH"), Some(current.as_str()));
        assert_eq!(cmd.env.get_str("OPAL_PREFIX"), root.to_str());
    }

    #[test]
    fn test_system_command_leaves_environment_alone() {
        let pkg = tempdir().unwrap();
        let layout = RuntimeLayout::for_tag(PlatformTag::LinuxX86_64, pkg.path());
        let env = Environment::from_vars([("LD_LIBRARY_PATH", "/usr/lib"), ("HOME", "/home/u")]);
        let launcher = Launcher::new(
            &layout,
            &env,
            LauncherOptions::new("/opt/mpirt"),
            RecordingSpawner::default(),
            RecordingKernel::default(),
        );

        let req = LaunchRequest::new("wt.in").processes(2);
        let cmd = launcher.orchestrated_command(
            &LaunchDecision::UseSystemOrchestrator(PathBuf::from("/usr/bin/mpirun")),
            &req,
        );
        let expected = env.with_overrides(&[EnvOverride::set(NO_RESPAWN_ENV, "1")]);
        assert_eq!(cmd.env, expected);
    }

    #[test]
    fn test_pool_worker_environment() {
        let pkg = tempdir().unwrap();
        let layout = bundled_layout(PlatformTag::WindowsAmd64, pkg.path());
        let env = Environment::from_vars([("PATH", "C:/Windows")]);
        let launcher = Launcher::new(
            &layout,
            &env,
            LauncherOptions::new("mpirt.exe"),
            RecordingSpawner::default(),
            RecordingKernel::default(),
        );

        let cmds = launcher.pool_commands(&LaunchRequest::new("wt.in").processes(3));
        assert_eq!(cmds.len(), 3);
        let bin = layout.bundled_bin_dir().unwrap();
        for (rank, cmd) in cmds.iter().enumerate() {
            assert_eq!(cmd.program, PathBuf::from("mpirt.exe"));
            assert_eq!(cmd.env.get_str("PMI_RANK"), Some(rank.to_string().as_str()));
            assert_eq!(cmd.env.get_str("PMI_SIZE"), Some("3"));
            assert_eq!(cmd.env.get_str(NO_RESPAWN_ENV), Some("1"));
            let path = cmd.env.get_str("PATH").unwrap();
            assert_eq!(path, format!("{};C:/Windows", bin.display()));
            assert_eq!(cmd.args.last().map(|a| a.as_os_str()), Some(OsStr::new(NO_RESPAWN_FLAG)));
        }
    }

    #[test]
    fn test_pool_reports_first_failure_in_rank_order() {
        let pkg = tempdir().unwrap();
        let layout = RuntimeLayout::for_tag(PlatformTag::WindowsAmd64, pkg.path());
        let env = Environment::new();
        let launcher = Launcher::new(
            &layout,
            &env,
            LauncherOptions::new("mpirt.exe"),
            RecordingSpawner {
                codes: vec![0, 5, 9, 0],
                ..Default::default()
            },
            RecordingKernel::default(),
        );

        let outcome = launcher.run(&LaunchRequest::new("wt.in").processes(4)).unwrap();
        assert_eq!(outcome.decision, LaunchDecision::UseMultiprocessFallback);
        assert_eq!(outcome.exit_code, 5);
        assert_eq!(launcher.spawner.calls.borrow().len(), 4);
        assert!(launcher.kernel.runs.borrow().is_empty());
    }

    #[test]
    fn test_serial_rank_comes_from_environment() {
        let pkg = tempdir().unwrap();
        let layout = RuntimeLayout::for_tag(PlatformTag::LinuxX86_64, pkg.path());
        let env = Environment::from_vars([("OMPI_COMM_WORLD_RANK", "2")]);
        let launcher = Launcher::new(
            &layout,
            &env,
            LauncherOptions::new("/opt/mpirt"),
            RecordingSpawner::default(),
            RecordingKernel::default(),
        );

        let outcome = launcher.run(&LaunchRequest::new("wt.in").no_respawn()).unwrap();
        assert_eq!(outcome.trace, vec![LaunchState::Start, LaunchState::RunSerial, LaunchState::Done(0)]);
        assert_eq!(launcher.kernel.runs.borrow()[0].rank, 2);
    }
}
