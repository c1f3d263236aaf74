//! Rank-aware console output
//!
//! Under an orchestrator every worker runs the same code; only the primary
//! rank talks to the user.

use mpirt_platform::{is_primary, Environment};
use std::fmt::Display;

/// User-facing output, silenced on non-primary ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Console {
    primary: bool,
}

impl Console {
    /// Console for an explicit primary flag
    pub fn new(primary: bool) -> Self {
        Console { primary }
    }

    /// Console for the rank found in `env` (unresolved counts as primary)
    pub fn for_env(env: &Environment) -> Self {
        Self::new(is_primary(env))
    }

    /// Whether this process prints
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Informational line on stdout
    pub fn info(&self, msg: impl Display) {
        if self.primary {
            println!("{}", msg);
        }
    }

    /// Warning line on stderr
    pub fn warn(&self, msg: impl Display) {
        if self.primary {
            eprintln!("warning: {}", msg);
        }
    }

    /// Error block on stderr
    pub fn error(&self, msg: impl Display) {
        if self.primary {
            eprintln!("{}", msg);
        }
    }
}
