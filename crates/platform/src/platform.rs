//! Platform resolution
//!
//! Maps the host (OS, architecture) pair onto the runtime layout used by the
//! bundled MPI tree. Resolution is total: anything we don't ship a runtime for
//! resolves to [`PlatformTag::Unsupported`], which downstream code treats as
//! "no bundled runtime" rather than as an error.
//!
//! ## Bundled Tree
//!
//! ```text
//! <package_root>/
//! └── internal_mpi/
//!     └── <platform_tag>/
//!         ├── bin/       # orchestrator, core library, auxiliaries
//!         ├── lib/
//!         └── include/
//! ```

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Fixed path segment between the package root and the platform tag
pub const INTERNAL_RUNTIME_DIR: &str = "internal_mpi";

/// Platforms with a bundled runtime layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlatformTag {
    /// Linux on x86_64 (Open MPI)
    #[serde(rename = "linux_x86_64")]
    LinuxX86_64,
    /// macOS on Apple silicon (Open MPI)
    #[serde(rename = "macos_arm64")]
    MacosArm64,
    /// Windows on x86_64 (MS-MPI)
    #[serde(rename = "windows_amd64")]
    WindowsAmd64,
    /// Anything else; no bundled runtime
    #[serde(rename = "unsupported")]
    Unsupported,
}

impl PlatformTag {
    /// All tags that carry a bundled runtime
    pub const SUPPORTED: [PlatformTag; 3] = [
        PlatformTag::LinuxX86_64,
        PlatformTag::MacosArm64,
        PlatformTag::WindowsAmd64,
    ];

    /// Resolve a tag from OS and architecture names.
    ///
    /// Accepts both Rust's `std::env::consts` spellings and the common
    /// aliases (`darwin`, `arm64`, `amd64`).
    pub fn from_host(os: &str, arch: &str) -> Self {
        let os = os.to_ascii_lowercase();
        let arch = arch.to_ascii_lowercase();
        match (os.as_str(), arch.as_str()) {
            ("linux", "x86_64" | "amd64") => PlatformTag::LinuxX86_64,
            ("macos" | "darwin", "aarch64" | "arm64") => PlatformTag::MacosArm64,
            ("windows", "x86_64" | "amd64") => PlatformTag::WindowsAmd64,
            _ => PlatformTag::Unsupported,
        }
    }

    /// Tag of the running process
    pub fn current() -> Self {
        Self::from_host(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Directory name used for this platform inside the bundled tree
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::LinuxX86_64 => "linux_x86_64",
            PlatformTag::MacosArm64 => "macos_arm64",
            PlatformTag::WindowsAmd64 => "windows_amd64",
            PlatformTag::Unsupported => "unsupported",
        }
    }

    /// Environment variable the dynamic loader searches for shared libraries
    pub fn library_search_var(&self) -> Option<&'static str> {
        match self {
            PlatformTag::LinuxX86_64 => Some("LD_LIBRARY_PATH"),
            PlatformTag::MacosArm64 => Some("DYLD_LIBRARY_PATH"),
            PlatformTag::WindowsAmd64 => Some("PATH"),
            PlatformTag::Unsupported => None,
        }
    }

    /// Separator for search-path lists on this platform
    pub fn path_separator(&self) -> char {
        match self {
            PlatformTag::WindowsAmd64 => ';',
            _ => ':',
        }
    }

    /// Whether a bundled runtime can exist for this platform
    pub fn is_supported(&self) -> bool {
        !matches!(self, PlatformTag::Unsupported)
    }

    /// Whether this platform uses MS-MPI rather than Open MPI
    pub fn is_windows(&self) -> bool {
        matches!(self, PlatformTag::WindowsAmd64)
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved runtime layout for one platform
///
/// Immutable once built. Recomputed on every invocation; it is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    /// Platform this layout was resolved for
    pub platform_tag: PlatformTag,
    /// Library search variable, `None` when unsupported
    pub library_search_var: Option<&'static str>,
    /// Root of the bundled runtime tree, `None` when unsupported
    pub bundled_root: Option<PathBuf>,
}

impl RuntimeLayout {
    /// Resolve the layout for an (OS, architecture) pair.
    ///
    /// `package_root` is the installed package directory; the bundled tree
    /// lives at `<package_root>/internal_mpi/<tag>`.
    pub fn resolve(os: &str, arch: &str, package_root: &Path) -> Self {
        Self::for_tag(PlatformTag::from_host(os, arch), package_root)
    }

    /// Layout of the running process
    pub fn current(package_root: &Path) -> Self {
        Self::for_tag(PlatformTag::current(), package_root)
    }

    /// Layout for an already-resolved tag
    pub fn for_tag(platform_tag: PlatformTag, package_root: &Path) -> Self {
        let bundled_root = platform_tag
            .is_supported()
            .then(|| package_root.join(Self::relative_root(platform_tag)));
        RuntimeLayout {
            platform_tag,
            library_search_var: platform_tag.library_search_var(),
            bundled_root,
        }
    }

    /// Bundled tree location relative to the package root
    pub fn relative_root(platform_tag: PlatformTag) -> PathBuf {
        Path::new(INTERNAL_RUNTIME_DIR).join(platform_tag.as_str())
    }

    /// Whether a bundled runtime may exist for this layout
    pub fn is_supported(&self) -> bool {
        self.bundled_root.is_some()
    }

    /// `bin/` of the bundled tree
    pub fn bundled_bin_dir(&self) -> Option<PathBuf> {
        self.bundled_root.as_ref().map(|root| root.join("bin"))
    }

    /// `lib/` of the bundled tree
    pub fn bundled_lib_dir(&self) -> Option<PathBuf> {
        self.bundled_root.as_ref().map(|root| root.join("lib"))
    }

    /// Directories to put on the library search path, in priority order.
    ///
    /// The injector stores the core library under `bin/`, so `bin/` follows
    /// `lib/`. Only directories that exist on disk are returned.
    pub fn existing_library_dirs(&self) -> Vec<PathBuf> {
        [self.bundled_lib_dir(), self.bundled_bin_dir()]
            .into_iter()
            .flatten()
            .filter(|dir| dir.is_dir())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_supported_hosts_resolve() {
        assert_eq!(PlatformTag::from_host("linux", "x86_64"), PlatformTag::LinuxX86_64);
        assert_eq!(PlatformTag::from_host("macos", "aarch64"), PlatformTag::MacosArm64);
        assert_eq!(PlatformTag::from_host("Darwin", "arm64"), PlatformTag::MacosArm64);
        assert_eq!(PlatformTag::from_host("windows", "x86_64"), PlatformTag::WindowsAmd64);
        assert_eq!(PlatformTag::from_host("windows", "AMD64"), PlatformTag::WindowsAmd64);
    }

    #[test]
    fn test_unsupported_hosts_resolve_to_sentinel() {
        assert_eq!(PlatformTag::from_host("linux", "aarch64"), PlatformTag::Unsupported);
        assert_eq!(PlatformTag::from_host("macos", "x86_64"), PlatformTag::Unsupported);
        assert_eq!(PlatformTag::from_host("freebsd", "x86_64"), PlatformTag::Unsupported);

        let layout = RuntimeLayout::resolve("solaris", "sparc", Path::new("/pkg"));
        assert!(!layout.is_supported());
        assert_eq!(layout.library_search_var, None);
        assert_eq!(layout.bundled_root, None);
        assert!(layout.existing_library_dirs().is_empty());
    }

    #[test]
    fn test_library_search_var_per_platform() {
        let root = Path::new("/pkg");
        let linux = RuntimeLayout::for_tag(PlatformTag::LinuxX86_64, root);
        let mac = RuntimeLayout::for_tag(PlatformTag::MacosArm64, root);
        let win = RuntimeLayout::for_tag(PlatformTag::WindowsAmd64, root);

        assert_eq!(linux.library_search_var, Some("LD_LIBRARY_PATH"));
        assert_eq!(mac.library_search_var, Some("DYLD_LIBRARY_PATH"));
        assert_eq!(win.library_search_var, Some("PATH"));
    }

    #[test]
    fn test_bundled_roots_are_unique() {
        let root = Path::new("/opt/app/wannier_tools");
        let roots: HashSet<PathBuf> = PlatformTag::SUPPORTED
            .iter()
            .filter_map(|tag| RuntimeLayout::for_tag(*tag, root).bundled_root)
            .collect();
        assert_eq!(roots.len(), PlatformTag::SUPPORTED.len());
    }

    #[test]
    fn test_bundled_root_shape() {
        let layout = RuntimeLayout::for_tag(PlatformTag::LinuxX86_64, Path::new("/pkg"));
        assert_eq!(
            layout.bundled_root,
            Some(PathBuf::from("/pkg/internal_mpi/linux_x86_64"))
        );
        assert_eq!(
            layout.bundled_lib_dir(),
            Some(PathBuf::from("/pkg/internal_mpi/linux_x86_64/lib"))
        );
    }

    #[test]
    fn test_existing_library_dirs_only_lists_present_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RuntimeLayout::for_tag(PlatformTag::LinuxX86_64, dir.path());
        assert!(layout.existing_library_dirs().is_empty());

        std::fs::create_dir_all(layout.bundled_bin_dir().unwrap()).unwrap();
        assert_eq!(layout.existing_library_dirs(), vec![layout.bundled_bin_dir().unwrap()]);

        std::fs::create_dir_all(layout.bundled_lib_dir().unwrap()).unwrap();
        assert_eq!(
            layout.existing_library_dirs(),
            vec![layout.bundled_lib_dir().unwrap(), layout.bundled_bin_dir().unwrap()]
        );
    }

    proptest! {
        #[test]
        fn prop_resolution_is_total(os in "[a-zA-Z]{0,12}", arch in "[a-zA-Z0-9_]{0,12}") {
            let layout = RuntimeLayout::resolve(&os, &arch, Path::new("/pkg"));
            prop_assert_eq!(layout.is_supported(), layout.platform_tag.is_supported());
            prop_assert_eq!(layout.library_search_var.is_some(), layout.is_supported());
        }
    }
}
