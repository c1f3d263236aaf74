//! ArgMatches → CliAction conversion.

use std::path::PathBuf;

use clap::ArgMatches;

/// The result of parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    /// Run the native program.
    Run(RunArgs),
    /// Inject the host MPI runtime into a package archive.
    Inject(ArchiveArgs),
    /// List a package archive.
    Show(ArchiveArgs),
    /// Write a sample input file.
    Sample { path: PathBuf },
}

/// Arguments of `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub processes: usize,
    pub no_respawn: bool,
}

/// Arguments of `inject` and `show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArgs {
    pub dest: PathBuf,
    pub package: Option<String>,
    pub json: bool,
}

/// Global flags shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub verbosity: u8,
}

/// Extract the global flags.
pub fn global_args(matches: &ArgMatches) -> GlobalArgs {
    GlobalArgs {
        config: matches.get_one::<PathBuf>("config").cloned(),
        verbosity: matches.get_count("verbose"),
    }
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    let (sub_name, m) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    match sub_name {
        "run" => {
            let input = m
                .get_one::<PathBuf>("input")
                .cloned()
                .ok_or("missing --input")?;
            let processes = m.get_one::<u64>("processes").copied().unwrap_or(1);
            Ok(CliAction::Run(RunArgs {
                input,
                output: m.get_one::<PathBuf>("output").cloned(),
                processes: usize::try_from(processes)
                    .map_err(|_| format!("process count out of range: {}", processes))?,
                no_respawn: m.get_flag("no-respawn"),
            }))
        }
        "inject" => Ok(CliAction::Inject(archive_args(m)?)),
        "show" => Ok(CliAction::Show(archive_args(m)?)),
        "sample" => Ok(CliAction::Sample {
            path: m
                .get_one::<PathBuf>("path")
                .cloned()
                .ok_or("missing sample path")?,
        }),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn archive_args(m: &ArgMatches) -> Result<ArchiveArgs, String> {
    Ok(ArchiveArgs {
        dest: m
            .get_one::<PathBuf>("dest")
            .cloned()
            .ok_or("missing DEST_DIR")?,
        package: m.get_one::<String>("package").cloned(),
        json: m.get_flag("json"),
    })
}
