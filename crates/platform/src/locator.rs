//! Runtime locator
//!
//! Probes well-known installation directories for the MPI runtime artifacts
//! of one platform. Every artifact is described by a [`SearchList`] (a file
//! name plus an ordered list of directories) and resolved with the same
//! [`first_existing`] primitive, so the platform-specific knowledge is pure
//! data.
//!
//! ## Policy
//!
//! - Core library and orchestrator are mandatory, but a miss is *reported*
//!   (`None`), never raised. The caller decides how bad that is.
//! - Auxiliary executables are optional; a miss shows up in
//!   `missing_auxiliaries` and the caller warns once.
//! - First found wins. Hits from different installations are never merged
//!   into one candidate.

use crate::platform::{PlatformTag, RuntimeLayout};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Return the first candidate that exists as a regular file
pub fn first_existing<I>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    candidates.into_iter().find(|p| p.is_file())
}

/// One artifact and the ordered directories it may live in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchList {
    /// File name of the artifact
    pub file_name: String,
    /// Directories to probe, highest priority first
    pub dirs: Vec<PathBuf>,
}

impl SearchList {
    /// Build a search list
    pub fn new<I, P>(file_name: impl Into<String>, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        SearchList {
            file_name: file_name.into(),
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Candidate paths in probe order
    pub fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.dirs.iter().map(move |d| d.join(&self.file_name))
    }

    /// Resolve with [`first_existing`]
    pub fn locate(&self) -> Option<PathBuf> {
        let found = first_existing(self.candidates());
        debug!(
            artifact = %self.file_name,
            found = ?found,
            "Probed {} location(s)",
            self.dirs.len()
        );
        found
    }
}

/// Artifacts found for one platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeArtifactSet {
    /// Core MPI shared library
    pub core_library: Option<PathBuf>,
    /// Orchestrator executable (`mpirun` / `mpiexec.exe`)
    pub orchestrator_executable: Option<PathBuf>,
    /// Auxiliary executables in declaration order
    pub auxiliary_executables: Vec<(String, Option<PathBuf>)>,
}

impl RuntimeArtifactSet {
    /// Whether both mandatory artifacts were found
    pub fn has_mandatory(&self) -> bool {
        self.core_library.is_some() && self.orchestrator_executable.is_some()
    }

    /// Names of auxiliaries that were not found
    pub fn missing_auxiliaries(&self) -> Vec<&str> {
        self.auxiliary_executables
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(n, _)| n.as_str())
            .collect()
    }
}

/// Well-known artifact names per platform
struct RuntimeNames {
    core_library: &'static str,
    orchestrator: &'static str,
    auxiliaries: &'static [&'static str],
}

fn runtime_names(tag: PlatformTag) -> Option<RuntimeNames> {
    match tag {
        PlatformTag::WindowsAmd64 => Some(RuntimeNames {
            core_library: "msmpi.dll",
            orchestrator: "mpiexec.exe",
            auxiliaries: &["smpd.exe", "msmpilaunchsvc.exe"],
        }),
        PlatformTag::LinuxX86_64 => Some(RuntimeNames {
            core_library: "libmpi.so.40",
            orchestrator: "mpirun",
            auxiliaries: &["orted", "prted"],
        }),
        PlatformTag::MacosArm64 => Some(RuntimeNames {
            core_library: "libmpi.40.dylib",
            orchestrator: "mpirun",
            auxiliaries: &["orted", "prted"],
        }),
        PlatformTag::Unsupported => None,
    }
}

/// Searches for the MPI runtime of one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLocator {
    platform_tag: PlatformTag,
    core_library: SearchList,
    orchestrator: SearchList,
    auxiliaries: Vec<SearchList>,
}

impl RuntimeLocator {
    /// Locator over the system-wide install locations of `tag`.
    ///
    /// Returns `None` for an unsupported platform.
    pub fn system(tag: PlatformTag) -> Option<Self> {
        let (lib_dirs, bin_dirs): (Vec<PathBuf>, Vec<PathBuf>) = match tag {
            PlatformTag::WindowsAmd64 => {
                let vendor = [
                    PathBuf::from("C:/Program Files/Microsoft MPI/Bin"),
                    PathBuf::from("C:/Program Files (x86)/Microsoft MPI/Bin"),
                ];
                let mut libs = vec![PathBuf::from("C:/Windows/System32")];
                libs.extend(vendor.iter().cloned());
                (libs, vendor.to_vec())
            }
            PlatformTag::LinuxX86_64 => {
                let roots = [
                    "/usr/lib/x86_64-linux-gnu/openmpi",
                    "/usr/lib64/openmpi",
                    "/usr/local",
                    "/opt/openmpi",
                ];
                let libs = roots.iter().map(|r| Path::new(r).join("lib")).collect();
                let mut bins = vec![PathBuf::from("/usr/bin")];
                bins.extend(roots.iter().map(|r| Path::new(r).join("bin")));
                (libs, bins)
            }
            PlatformTag::MacosArm64 => {
                let roots = ["/opt/homebrew", "/opt/homebrew/opt/open-mpi", "/usr/local"];
                (
                    roots.iter().map(|r| Path::new(r).join("lib")).collect(),
                    roots.iter().map(|r| Path::new(r).join("bin")).collect(),
                )
            }
            PlatformTag::Unsupported => return None,
        };
        Self::with_dirs(tag, lib_dirs, bin_dirs)
    }

    /// Locator restricted to the bundled tree of `layout`.
    ///
    /// The core library is looked up in `bin/` (where the injector puts it)
    /// and then `lib/`; executables only in `bin/`.
    pub fn bundled(layout: &RuntimeLayout) -> Option<Self> {
        let bin = layout.bundled_bin_dir()?;
        let lib = layout.bundled_lib_dir()?;
        Self::with_dirs(layout.platform_tag, vec![bin.clone(), lib], vec![bin])
    }

    /// Locator over installation roots, each holding `lib/` and `bin/`
    pub fn with_roots<I, P>(tag: PlatformTag, roots: I) -> Option<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: Vec<PathBuf> = roots.into_iter().map(|r| r.as_ref().to_path_buf()).collect();
        // The library may sit next to the executables (MS-MPI keeps it in Bin)
        let lib_dirs = roots
            .iter()
            .flat_map(|r| [r.join("lib"), r.join("bin")])
            .collect();
        let bin_dirs = roots.iter().map(|r| r.join("bin")).collect();
        Self::with_dirs(tag, lib_dirs, bin_dirs)
    }

    /// Locator over explicit library and executable directories
    pub fn with_dirs(tag: PlatformTag, lib_dirs: Vec<PathBuf>, bin_dirs: Vec<PathBuf>) -> Option<Self> {
        let names = runtime_names(tag)?;
        Some(RuntimeLocator {
            platform_tag: tag,
            core_library: SearchList::new(names.core_library, lib_dirs),
            orchestrator: SearchList::new(names.orchestrator, bin_dirs.clone()),
            auxiliaries: names
                .auxiliaries
                .iter()
                .map(|name| SearchList::new(*name, bin_dirs.clone()))
                .collect(),
        })
    }

    /// Platform this locator searches for
    pub fn platform_tag(&self) -> PlatformTag {
        self.platform_tag
    }

    /// File name of the core library
    pub fn core_library_name(&self) -> &str {
        &self.core_library.file_name
    }

    /// File name of the orchestrator
    pub fn orchestrator_name(&self) -> &str {
        &self.orchestrator.file_name
    }

    /// Find only the orchestrator
    pub fn locate_orchestrator(&self) -> Option<PathBuf> {
        self.orchestrator.locate()
    }

    /// Probe every artifact
    pub fn locate(&self) -> RuntimeArtifactSet {
        let set = RuntimeArtifactSet {
            core_library: self.core_library.locate(),
            orchestrator_executable: self.orchestrator.locate(),
            auxiliary_executables: self
                .auxiliaries
                .iter()
                .map(|aux| (aux.file_name.clone(), aux.locate()))
                .collect(),
        };

        for name in set.missing_auxiliaries() {
            debug!(platform = %self.platform_tag, "Auxiliary MPI executable {} not found", name);
        }

        set
    }

    /// Whether `path` lies under this locator's executable directories
    pub fn owns(&self, path: &Path) -> bool {
        self.orchestrator.dirs.iter().any(|d| path.starts_with(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_first_existing_picks_first_hit() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a/libmpi.so.40");
        let b = dir.path().join("b/libmpi.so.40");
        touch(&b);
        touch(&a);

        let found = first_existing(vec![dir.path().join("missing/libmpi.so.40"), a.clone(), b]);
        assert_eq!(found, Some(a));
    }

    #[test]
    fn test_first_existing_ignores_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("mpirun")).unwrap();
        assert_eq!(first_existing(vec![dir.path().join("mpirun")]), None);
    }

    #[test]
    fn test_nothing_found_is_not_an_error() {
        let dir = tempdir().unwrap();
        let locator =
            RuntimeLocator::with_roots(PlatformTag::LinuxX86_64, [dir.path().join("nope")]).unwrap();

        let set = locator.locate();
        assert_eq!(set.core_library, None);
        assert_eq!(set.orchestrator_executable, None);
        assert_eq!(set.auxiliary_executables.len(), 2);
        assert!(set.auxiliary_executables.iter().all(|(_, p)| p.is_none()));
        assert!(!set.has_mandatory());
    }

    #[test]
    fn test_first_root_wins_per_artifact() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        touch(&first.join("bin/mpirun"));
        touch(&second.join("bin/mpirun"));
        touch(&second.join("lib/libmpi.so.40"));
        touch(&second.join("bin/orted"));

        let locator = RuntimeLocator::with_roots(PlatformTag::LinuxX86_64, [&first, &second]).unwrap();
        let set = locator.locate();

        assert_eq!(set.orchestrator_executable, Some(first.join("bin/mpirun")));
        assert_eq!(set.core_library, Some(second.join("lib/libmpi.so.40")));
        assert_eq!(
            set.auxiliary_executables,
            vec![
                ("orted".to_string(), Some(second.join("bin/orted"))),
                ("prted".to_string(), None),
            ]
        );
        assert_eq!(set.missing_auxiliaries(), vec!["prted"]);
    }

    #[test]
    fn test_windows_library_next_to_executables() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("bin/msmpi.dll"));
        touch(&dir.path().join("bin/mpiexec.exe"));

        let locator = RuntimeLocator::with_roots(PlatformTag::WindowsAmd64, [dir.path()]).unwrap();
        let set = locator.locate();
        assert!(set.has_mandatory());
        assert_eq!(locator.core_library_name(), "msmpi.dll");
        assert_eq!(locator.orchestrator_name(), "mpiexec.exe");
    }

    #[test]
    fn test_bundled_locator_is_restricted_to_bundled_tree() {
        let dir = tempdir().unwrap();
        let layout = RuntimeLayout::for_tag(PlatformTag::MacosArm64, dir.path());
        let bin = layout.bundled_bin_dir().unwrap();
        touch(&bin.join("mpirun"));

        let locator = RuntimeLocator::bundled(&layout).unwrap();
        assert_eq!(locator.locate_orchestrator(), Some(bin.join("mpirun")));
        assert!(locator.owns(&bin.join("mpirun")));
        assert!(!locator.owns(Path::new("/usr/bin/mpirun")));
    }

    #[test]
    fn test_unsupported_platform_has_no_locator() {
        assert!(RuntimeLocator::system(PlatformTag::Unsupported).is_none());
        let layout = RuntimeLayout::for_tag(PlatformTag::Unsupported, Path::new("/pkg"));
        assert!(RuntimeLocator::bundled(&layout).is_none());
    }

    #[test]
    fn test_system_search_lists_are_ordered() {
        let locator = RuntimeLocator::system(PlatformTag::WindowsAmd64).unwrap();
        assert_eq!(
            locator.core_library.dirs.first(),
            Some(&PathBuf::from("C:/Windows/System32"))
        );
        assert_eq!(
            locator.orchestrator.dirs.first(),
            Some(&PathBuf::from("C:/Program Files/Microsoft MPI/Bin"))
        );

        let locator = RuntimeLocator::system(PlatformTag::LinuxX86_64).unwrap();
        assert_eq!(locator.orchestrator.dirs.first(), Some(&PathBuf::from("/usr/bin")));
    }
}
