//! mpirt CLI: bundled MPI runtime injection and parallel launch.
//!
//! Start-up order matters:
//! 1. logging
//! 2. arguments and configuration
//! 3. library search path (the only write to the process environment)
//! 4. command dispatch
//!
//! Commands:
//! - `mpirt run [-i IN] [-o OUT] [-n N]`: run the native program
//! - `mpirt inject DEST_DIR`: embed the host MPI runtime (build time)
//! - `mpirt show DEST_DIR`: list a package archive
//! - `mpirt sample [PATH]`: write a sample input file

mod commands;
mod config;
mod format;
mod parse;
mod sample;

use std::path::Path;
use std::process;

use mpirt::archive::{ArchiveInjector, InjectOptions, PackageReader};
use mpirt::launcher::{
    classify_failure, explain_failure, Console, FailureClass, LaunchRequest, Launcher,
    LauncherOptions, LibraryPathInjector, ProgramKernel, SystemSpawner,
};
use mpirt::{Environment, Error, PlatformTag, Result, RuntimeLayout};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use config::Config;
use format::{format_inject_report, format_listing, OutputMode};
use parse::{global_args, matches_to_action, ArchiveArgs, CliAction, RunArgs};

fn main() {
    let matches = build_cli().get_matches();
    let globals = global_args(&matches);
    init_logging(globals.verbosity);

    let exit_code = match run(&matches, globals.config.as_deref()) {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            e.exit_code()
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(matches: &clap::ArgMatches, config_path: Option<&Path>) -> Result<i32> {
    let action = matches_to_action(matches).map_err(Error::config)?;
    let config = Config::load(config_path)?;

    let exe = std::env::current_exe()?;
    let env = Environment::capture();
    let package_root = config.package_root(&env, &exe);
    let layout = RuntimeLayout::current(&package_root);
    debug!("Runtime layout: {:?}", layout);
    let env = apply_library_path(&layout, env);

    match action {
        CliAction::Run(args) => cmd_run(args, &config, &package_root, &layout, &env, &exe),
        CliAction::Inject(args) => cmd_inject(args, &config),
        CliAction::Show(args) => cmd_show(args, &config),
        CliAction::Sample { path } => {
            sample::write_sample(&path)?;
            let console = Console::for_env(&env);
            console.info(format!("Sample input file '{}' created.", path.display()));
            console.info("Edit it as needed, then run: mpirt run");
            Ok(0)
        }
    }
}

/// Put the bundled libraries on the loader search path.
///
/// Returns the environment children should inherit.
fn apply_library_path(layout: &RuntimeLayout, env: Environment) -> Environment {
    match LibraryPathInjector::plan(layout, &env) {
        Some(over) => {
            let (key, value) = over.resolve(&env);
            info!("Setting {} for the bundled MPI runtime", key.to_string_lossy());
            std::env::set_var(&key, &value);
            env.with_overrides(&[over])
        }
        None => env,
    }
}

fn cmd_run(
    args: RunArgs,
    config: &Config,
    package_root: &Path,
    layout: &RuntimeLayout,
    env: &Environment,
    exe: &Path,
) -> Result<i32> {
    let kernel = ProgramKernel::new(config.program_path(package_root))
        .args(config.program.args.iter().cloned())
        .pass_input(config.program.pass_input);
    let options = LauncherOptions::new(exe)
        .strict_parallel(config.launch.strict_parallel)
        .orchestrator_args(config.launch.orchestrator_args.clone());

    let request = LaunchRequest {
        input: args.input,
        output: args.output,
        process_count: args.processes,
        suppress_respawn: args.no_respawn,
    };

    let console = Console::for_env(env);
    if request.process_count == 1 || request.suppress_respawn {
        console.info(format!("Running {} on {}", kernel.program().display(), request.input.display()));
    }

    let launcher = Launcher::new(layout, env, options, SystemSpawner, kernel);
    let outcome = launcher.run(&request)?;
    debug!("Launch finished: {:?}", outcome);
    Ok(outcome.exit_code)
}

fn cmd_inject(args: ArchiveArgs, config: &Config) -> Result<i32> {
    let package = args.package.unwrap_or_else(|| config.package.name.clone());
    let report = ArchiveInjector::new(InjectOptions::new(package)).inject(&args.dest)?;
    println!("{}", format_inject_report(&report, OutputMode::from_flag(args.json))?);
    Ok(0)
}

fn cmd_show(args: ArchiveArgs, config: &Config) -> Result<i32> {
    let package = args.package.unwrap_or_else(|| config.package.name.clone());
    let archive = PackageReader::find_unique(&args.dest, &package)?;
    let listing = PackageReader::list(&archive)?;
    println!("{}", format_listing(&listing, OutputMode::from_flag(args.json))?);
    Ok(0)
}

fn report_error(e: &Error) {
    match e.kernel_failure() {
        Some(failure) if classify_failure(&failure.failure_text()) == FailureClass::MpiRuntime => {
            Console::for_env(&Environment::capture())
                .error(explain_failure(&failure.failure_text(), PlatformTag::current()));
        }
        _ => eprintln!("error: {}", e),
    }
}
