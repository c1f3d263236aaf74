//! Configuration file.
//!
//! ```toml
//! [package]
//! name = "wannier_tools"
//! root = "/opt/wt/wannier_tools"
//!
//! [program]
//! path = "wt.x"
//! args = []
//! pass_input = true
//!
//! [launch]
//! strict_parallel = false
//! orchestrator_args = ["--oversubscribe"]
//! ```
//!
//! Every section and key is optional. Unknown keys are rejected.

use std::fs;
use std::path::{Path, PathBuf};

use mpirt::{Environment, Error, Result};
use serde::Deserialize;
use tracing::debug;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "MPIRT_CONFIG";
/// Environment variable overriding the installed package root
pub const PACKAGE_ROOT_ENV: &str = "MPIRT_PACKAGE_ROOT";
/// Configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "mpirt.toml";
/// Package name when none is configured
pub const DEFAULT_PACKAGE_NAME: &str = "wannier_tools";
/// Native program when none is configured
pub const DEFAULT_PROGRAM: &str = "wt.x";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub package: PackageConfig,
    pub program: ProgramConfig,
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Archive prefix and bundled path segment
    pub name: String,
    /// Installed package root
    pub root: Option<PathBuf>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        PackageConfig {
            name: DEFAULT_PACKAGE_NAME.to_string(),
            root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgramConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Append the input file name to `args`
    pub pass_input: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        ProgramConfig {
            path: PathBuf::from(DEFAULT_PROGRAM),
            args: Vec::new(),
            pass_input: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchConfig {
    pub strict_parallel: bool,
    pub orchestrator_args: Vec<String>,
}

impl Config {
    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist. Without one, `./mpirt.toml` is used
    /// when present, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !local.is_file() {
                    debug!("No configuration file, using defaults");
                    return Ok(Config::default());
                }
                local
            }
        };

        let text = fs::read_to_string(&path)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded configuration from {}", path.display());
        toml::from_str(&text).map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Installed package root.
    ///
    /// `MPIRT_PACKAGE_ROOT`, then `package.root`, then
    /// `<directory of exe>/<package name>`.
    pub fn package_root(&self, env: &Environment, exe: &Path) -> PathBuf {
        if let Some(root) = env.get(PACKAGE_ROOT_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(root);
        }
        if let Some(root) = &self.package.root {
            return root.clone();
        }
        exe.parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.package.name)
    }

    /// Native program to execute.
    ///
    /// Bare names are looked up on `PATH`; relative paths with a directory
    /// part are taken relative to the package root.
    pub fn program_path(&self, package_root: &Path) -> PathBuf {
        let path = &self.program.path;
        if path.is_absolute() || path.components().count() == 1 {
            path.clone()
        } else {
            package_root.join(path)
        }
    }
}
