//! Package archive types

use mpirt_platform::{PlatformTag, INTERNAL_RUNTIME_DIR};
use serde::Serialize;
use std::path::PathBuf;

/// File name suffix of package archives
pub const PACKAGE_EXTENSION: &str = ".pkg.tar.zst";

/// zstd level used when repacking; fixed so output is byte-stable
pub const ZSTD_LEVEL: i32 = 3;

/// Subdirectories of the bundled runtime tree
pub const RUNTIME_SUBDIRS: [&str; 3] = ["bin", "lib", "include"];

/// In-archive location of the bundled runtime: `<package>/internal_mpi/<tag>`
pub fn bundled_prefix(package_name: &str, platform: PlatformTag) -> String {
    format!("{}/{}/{}", package_name, INTERNAL_RUNTIME_DIR, platform.as_str())
}

/// xxh3 digest as lowercase hex
pub fn xxh3_hex(data: &[u8]) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(data))
}

/// Options for [`crate::ArchiveInjector`]
///
/// ```ignore
/// let opts = InjectOptions::new("wannier_tools").platform(PlatformTag::WindowsAmd64);
/// ```
#[derive(Debug, Clone)]
pub struct InjectOptions {
    /// Package name; archive prefix and first path segment of the tree
    pub package_name: String,
    /// Platform whose runtime is embedded
    pub platform: PlatformTag,
}

impl InjectOptions {
    /// Options for `package_name` on the running platform
    pub fn new(package_name: impl Into<String>) -> Self {
        InjectOptions {
            package_name: package_name.into(),
            platform: PlatformTag::current(),
        }
    }

    /// Target a specific platform
    pub fn platform(mut self, platform: PlatformTag) -> Self {
        self.platform = platform;
        self
    }
}

/// Outcome of a successful injection
#[derive(Debug, Clone, Serialize)]
pub struct InjectReport {
    /// Archive that was rewritten
    pub archive: PathBuf,
    /// Platform whose runtime was embedded
    pub platform: PlatformTag,
    /// In-archive prefix of the bundled tree
    pub bundled_prefix: String,
    /// In-archive paths of copied artifacts
    pub copied: Vec<String>,
    /// Degraded-capability warnings
    pub warnings: Vec<String>,
    /// xxh3 of the rewritten archive
    pub digest: String,
}

/// One archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Relative path inside the archive
    pub path: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Contents of an archive
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveListing {
    /// Archive that was read
    pub archive: PathBuf,
    /// Entries in archive order
    pub entries: Vec<EntryInfo>,
    /// xxh3 of the archive file
    pub digest: String,
}

impl ArchiveListing {
    /// Number of file entries
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_dir).count()
    }

    /// Sum of file sizes
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Whether an entry with this exact path exists
    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }
}
