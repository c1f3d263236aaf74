//! Start-time library path injection
//!
//! Makes the bundled shared libraries discoverable before the native program
//! is loaded. The override is computed here and applied by the binary's
//! start-up code, which is the only place the process environment is written.

use mpirt_platform::{EnvOverride, Environment, RuntimeLayout};
use std::path::PathBuf;
use tracing::debug;

/// Plans the library search path override for the bundled runtime
pub struct LibraryPathInjector;

impl LibraryPathInjector {
    /// Override to apply, or `None` when nothing should change.
    ///
    /// No-op on Windows (PATH is handled per spawn), on unsupported
    /// platforms, when no bundled directory exists, and when the search
    /// variable already starts with the bundled directories (re-invoked
    /// children inherit them from their parent).
    pub fn plan(layout: &RuntimeLayout, env: &Environment) -> Option<EnvOverride> {
        let var = layout.library_search_var?;
        if layout.platform_tag.is_windows() {
            return None;
        }

        let dirs = layout.existing_library_dirs();
        if dirs.is_empty() {
            debug!("No bundled library directory for {}", layout.platform_tag);
            return None;
        }

        if already_prepended(env.get_str(var), &dirs, layout.platform_tag.path_separator()) {
            debug!("{} already carries the bundled runtime", var);
            return None;
        }

        debug!("Prepending {:?} to {}", dirs, var);
        Some(EnvOverride::prepend(
            var,
            dirs,
            layout.platform_tag.path_separator(),
        ))
    }
}

/// Whether `current` starts with exactly `dirs`, in order
pub(crate) fn already_prepended(current: Option<&str>, dirs: &[PathBuf], separator: char) -> bool {
    let current = match current {
        Some(value) => value,
        None => return false,
    };
    let mut entries = current.split(separator);
    dirs.iter()
        .all(|dir| entries.next().map(PathBuf::from).as_ref() == Some(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpirt_platform::PlatformTag;
    use std::fs;
    use tempfile::tempdir;

    fn layout_with_dirs(tag: PlatformTag, subdirs: &[&str]) -> (tempfile::TempDir, RuntimeLayout) {
        let pkg = tempdir().unwrap();
        let layout = RuntimeLayout::for_tag(tag, pkg.path());
        let root = layout.bundled_root.clone().unwrap();
        for sub in subdirs {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        (pkg, layout)
    }

    #[test]
    fn test_prepends_lib_then_bin() {
        let (_pkg, layout) = layout_with_dirs(PlatformTag::LinuxX86_64, &["lib", "bin"]);
        let env = Environment::from_vars([("LD_LIBRARY_PATH", "/usr/lib")]);

        let over = LibraryPathInjector::plan(&layout, &env).unwrap();
        let next = env.with_overrides(&[over]);

        let lib = layout.bundled_lib_dir().unwrap();
        let bin = layout.bundled_bin_dir().unwrap();
        let expected = format!("{}:{}:/usr/lib", lib.display(), bin.display());
        assert_eq!(next.get_str("LD_LIBRARY_PATH"), Some(expected.as_str()));
    }

    #[test]
    fn test_unset_variable_has_no_trailing_separator() {
        let (_pkg, layout) = layout_with_dirs(PlatformTag::MacosArm64, &["lib"]);
        let env = Environment::new();

        let next = env.with_overrides(&[LibraryPathInjector::plan(&layout, &env).unwrap()]);
        let lib = layout.bundled_lib_dir().unwrap();
        assert_eq!(
            next.get_str("DYLD_LIBRARY_PATH"),
            Some(lib.to_string_lossy().as_ref())
        );
    }

    #[test]
    fn test_missing_bundle_is_noop() {
        let (_pkg, layout) = layout_with_dirs(PlatformTag::LinuxX86_64, &[]);
        assert!(LibraryPathInjector::plan(&layout, &Environment::new()).is_none());
    }

    #[test]
    fn test_windows_and_unsupported_are_noop() {
        let (_pkg, windows) = layout_with_dirs(PlatformTag::WindowsAmd64, &["lib", "bin"]);
        assert!(LibraryPathInjector::plan(&windows, &Environment::new()).is_none());

        let pkg = tempdir().unwrap();
        let unsupported = RuntimeLayout::for_tag(PlatformTag::Unsupported, pkg.path());
        assert!(LibraryPathInjector::plan(&unsupported, &Environment::new()).is_none());
    }

    #[test]
    fn test_second_application_is_noop() {
        let (_pkg, layout) = layout_with_dirs(PlatformTag::LinuxX86_64, &["lib", "bin"]);
        let env = Environment::from_vars([("LD_LIBRARY_PATH", "/opt/x")]);

        let once = env.with_overrides(&[LibraryPathInjector::plan(&layout, &env).unwrap()]);
        assert!(LibraryPathInjector::plan(&layout, &once).is_none());
    }
}
