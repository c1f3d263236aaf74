//! Environment modelling
//!
//! Child environments are built as values, never by mutating the process
//! environment in place:
//!
//! ```text
//! Environment::capture()            // snapshot of the parent
//!     .with_overrides(&overrides)   // pure: returns a new mapping
//!     → handed to exactly one spawn
//! ```
//!
//! The single place allowed to write the real process environment is the
//! binary's start-up sequence, which resolves an [`EnvOverride`] against the
//! captured environment and applies the resulting pair once.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// A single change to apply on top of a base environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOverride {
    /// Replace (or create) a variable
    Set {
        /// Variable name
        key: String,
        /// New value
        value: OsString,
    },
    /// Put directories in front of a search-path list, keeping the old value
    /// as suffix
    Prepend {
        /// Variable name
        key: String,
        /// Directories to prepend, highest priority first
        dirs: Vec<PathBuf>,
        /// List separator for the target platform
        separator: char,
    },
}

impl EnvOverride {
    /// Shorthand for [`EnvOverride::Set`]
    pub fn set(key: impl Into<String>, value: impl Into<OsString>) -> Self {
        EnvOverride::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Shorthand for [`EnvOverride::Prepend`]
    pub fn prepend(key: impl Into<String>, dirs: Vec<PathBuf>, separator: char) -> Self {
        EnvOverride::Prepend {
            key: key.into(),
            dirs,
            separator,
        }
    }

    /// Compute the concrete `(key, value)` this override produces on `env`.
    ///
    /// The key returned is the spelling already present in `env` when one
    /// exists (Windows stores `Path`, not `PATH`).
    pub fn resolve(&self, env: &Environment) -> (OsString, OsString) {
        match self {
            EnvOverride::Set { key, value } => (env.key_for(key), value.clone()),
            EnvOverride::Prepend {
                key,
                dirs,
                separator,
            } => {
                let mut sep = [0u8; 4];
                let sep = OsStr::new(separator.encode_utf8(&mut sep));

                let mut value = OsString::new();
                for (i, dir) in dirs.iter().enumerate() {
                    if i > 0 {
                        value.push(sep);
                    }
                    value.push(dir.as_os_str());
                }
                if let Some(existing) = env.get(key).filter(|v| !v.is_empty()) {
                    if !value.is_empty() {
                        value.push(sep);
                    }
                    value.push(existing);
                }
                (env.key_for(key), value)
            }
        }
    }
}

/// An immutable snapshot of environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    /// Build from arbitrary pairs; later duplicates win
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Environment {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable.
    ///
    /// On Windows the lookup falls back to a case-insensitive match.
    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars
            .get(OsStr::new(key))
            .or_else(|| {
                if cfg!(windows) {
                    self.vars
                        .iter()
                        .find(|(k, _)| k.to_string_lossy().eq_ignore_ascii_case(key))
                        .map(|(_, v)| v)
                } else {
                    None
                }
            })
            .map(|v| v.as_os_str())
    }

    /// Look up a variable as UTF-8; non-UTF-8 values are treated as absent
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.to_str())
    }

    /// Whether a variable is present
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the environment is empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate variables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    /// Return a new environment with `overrides` applied in order.
    ///
    /// `self` is left untouched.
    pub fn with_overrides(&self, overrides: &[EnvOverride]) -> Environment {
        let mut next = self.clone();
        for o in overrides {
            let (key, value) = o.resolve(&next);
            next.vars.insert(key, value);
        }
        next
    }

    fn key_for(&self, key: &str) -> OsString {
        if cfg!(windows) {
            if let Some(existing) = self
                .vars
                .keys()
                .find(|k| k.to_string_lossy().eq_ignore_ascii_case(key))
            {
                return existing.clone();
            }
        }
        OsString::from(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_creates_and_replaces() {
        let base = Environment::from_vars([("A", "1")]);
        let next = base.with_overrides(&[EnvOverride::set("A", "2"), EnvOverride::set("B", "3")]);

        assert_eq!(next.get_str("A"), Some("2"));
        assert_eq!(next.get_str("B"), Some("3"));
        // Base is a separate value
        assert_eq!(base.get_str("A"), Some("1"));
        assert!(!base.contains("B"));
    }

    #[test]
    fn test_prepend_keeps_existing_as_suffix() {
        let base = Environment::from_vars([("LD_LIBRARY_PATH", "/usr/lib")]);
        let next = base.with_overrides(&[EnvOverride::prepend(
            "LD_LIBRARY_PATH",
            vec![PathBuf::from("/pkg/lib"), PathBuf::from("/pkg/bin")],
            ':',
        )]);
        assert_eq!(next.get_str("LD_LIBRARY_PATH"), Some("/pkg/lib:/pkg/bin:/usr/lib"));
    }

    #[test]
    fn test_prepend_on_missing_variable_has_no_trailing_separator() {
        let base = Environment::new();
        let next = base.with_overrides(&[EnvOverride::prepend(
            "DYLD_LIBRARY_PATH",
            vec![PathBuf::from("/pkg/lib")],
            ':',
        )]);
        assert_eq!(next.get_str("DYLD_LIBRARY_PATH"), Some("/pkg/lib"));
    }

    #[test]
    fn test_prepend_uses_given_separator() {
        let base = Environment::from_vars([("PATH", r"C:\Windows")]);
        let next = base.with_overrides(&[EnvOverride::prepend(
            "PATH",
            vec![PathBuf::from(r"C:\pkg\bin")],
            ';',
        )]);
        assert_eq!(next.get_str("PATH"), Some(r"C:\pkg\bin;C:\Windows"));
    }

    #[test]
    fn test_overrides_apply_in_order() {
        let base = Environment::new();
        let next = base.with_overrides(&[
            EnvOverride::prepend("P", vec![PathBuf::from("/a")], ':'),
            EnvOverride::prepend("P", vec![PathBuf::from("/b")], ':'),
        ]);
        assert_eq!(next.get_str("P"), Some("/b:/a"));
    }

    #[test]
    fn test_resolve_does_not_touch_environment() {
        let base = Environment::from_vars([("X", "old")]);
        let (key, value) = EnvOverride::set("X", "new").resolve(&base);
        assert_eq!(key, OsString::from("X"));
        assert_eq!(value, OsString::from("new"));
        assert_eq!(base.get_str("X"), Some("old"));
    }

    proptest! {
        #[test]
        fn prop_prepend_starts_with_first_dir(
            existing in "[a-z/]{0,20}",
            dir in "/[a-z]{1,10}",
        ) {
            let base = Environment::from_vars([("LD_LIBRARY_PATH", existing.clone())]);
            let next = base.with_overrides(&[EnvOverride::prepend(
                "LD_LIBRARY_PATH",
                vec![PathBuf::from(&dir)],
                ':',
            )]);
            let value = next.get_str("LD_LIBRARY_PATH").unwrap().to_string();
            prop_assert!(value.starts_with(&dir));
            prop_assert!(value.ends_with(&existing));
            prop_assert_eq!(base.get_str("LD_LIBRARY_PATH"), Some(existing.as_str()));
        }
    }
}
