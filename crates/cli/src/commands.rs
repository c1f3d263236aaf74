//! clap command tree.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};
use mpirt::launcher::{INPUT_FLAG, NO_RESPAWN_FLAG, OUTPUT_FLAG, RUN_SUBCOMMAND};

use crate::config::{CONFIG_ENV, DEFAULT_PACKAGE_NAME};

/// Default input file of the native program
pub const DEFAULT_INPUT: &str = "wt.in";

/// Build the top-level command.
pub fn build_cli() -> Command {
    Command::new("mpirt")
        .about("Bundled MPI runtime injection and parallel launch")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .env(CONFIG_ENV)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (default: ./mpirt.toml when present)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Raise log verbosity (-v info, -vv debug)"),
        )
        .subcommand(run_command())
        .subcommand(archive_command(
            "inject",
            "Embed the host MPI runtime into the package archive in DEST_DIR",
        ))
        .subcommand(archive_command(
            "show",
            "List the contents of the package archive in DEST_DIR",
        ))
        .subcommand(
            Command::new("sample")
                .about("Write a sample input file")
                .arg(
                    Arg::new("path")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(DEFAULT_INPUT)
                        .help("Where to write it"),
                ),
        )
}

fn run_command() -> Command {
    Command::new(RUN_SUBCOMMAND)
        .about("Run the native program, in parallel when -n > 1")
        .arg(
            Arg::new("input")
                .short('i')
                .long(flag_name(INPUT_FLAG))
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_INPUT)
                .help("Input file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long(flag_name(OUTPUT_FLAG))
                .value_parser(value_parser!(PathBuf))
                .help("Write program output to this file instead of stdout"),
        )
        .arg(
            Arg::new("processes")
                .short('n')
                .long("processes")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("1")
                .help("Number of processes"),
        )
        .arg(
            Arg::new("no-respawn")
                .long(flag_name(NO_RESPAWN_FLAG))
                .action(ArgAction::SetTrue)
                .hide(true),
        )
}

fn archive_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("dest")
                .required(true)
                .value_name("DEST_DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("package")
                .long("package")
                .help(format!(
                    "Package name (default: from config, else {})",
                    DEFAULT_PACKAGE_NAME
                )),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the result as JSON"),
        )
}

fn flag_name(flag: &'static str) -> &'static str {
    flag.trim_start_matches('-')
}
