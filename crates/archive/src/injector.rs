//! MPI runtime injection
//!
//! Embeds the build host's MPI runtime into a package archive.
//!
//! ## Injection Sequence
//!
//! ```text
//! 1. find_unique()     - exactly one <package>*.pkg.tar.zst in the directory
//! 2. extract_to()      - unpack into a scratch directory
//! 3. skeleton          - <package>/internal_mpi/<tag>/{bin,lib,include}
//! 4. locate + copy     - core library and orchestrator (mandatory),
//!                        auxiliaries (optional) into bin/
//! 5. write_atomic()    - repack the whole scratch tree, rename over original
//! ```
//!
//! Nothing touches the original archive before step 5's rename, so every
//! failure leaves it byte-identical.

use crate::error::{PackageError, PackageResult};
use crate::reader::PackageReader;
use crate::types::{bundled_prefix, xxh3_hex, InjectOptions, InjectReport, RUNTIME_SUBDIRS};
use crate::writer::PackageWriter;
use mpirt_platform::RuntimeLocator;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Embeds a located MPI runtime into a package archive
pub struct ArchiveInjector {
    options: InjectOptions,
    locator: Option<RuntimeLocator>,
    writer: PackageWriter,
}

impl ArchiveInjector {
    /// Injector probing the system install locations of the target platform
    pub fn new(options: InjectOptions) -> Self {
        let locator = RuntimeLocator::system(options.platform);
        ArchiveInjector {
            options,
            locator,
            writer: PackageWriter::new(),
        }
    }

    /// Injector using a custom locator
    pub fn with_locator(options: InjectOptions, locator: RuntimeLocator) -> Self {
        ArchiveInjector {
            options,
            locator: Some(locator),
            writer: PackageWriter::new(),
        }
    }

    /// Inject into the single package archive found in `dest_dir`
    pub fn inject(&self, dest_dir: &Path) -> PackageResult<InjectReport> {
        let platform = self.options.platform;
        let archive = PackageReader::find_unique(dest_dir, &self.options.package_name)?;
        info!("Injecting {} MPI runtime into {}", platform, archive.display());

        let locator = match &self.locator {
            Some(locator) if platform.is_supported() => locator,
            _ => return Err(PackageError::UnsupportedPlatform { platform }),
        };

        let scratch = tempfile::tempdir()?;
        PackageReader::extract_to(&archive, scratch.path())?;

        let prefix = bundled_prefix(&self.options.package_name, platform);
        let runtime_dir = scratch.path().join(&prefix);
        for sub in RUNTIME_SUBDIRS {
            fs::create_dir_all(runtime_dir.join(sub))?;
        }
        let bin_dir = runtime_dir.join("bin");

        let artifacts = locator.locate();
        let core_library = artifacts
            .core_library
            .as_ref()
            .ok_or_else(|| PackageError::missing_artifact(locator.core_library_name()))?;
        let orchestrator = artifacts
            .orchestrator_executable
            .as_ref()
            .ok_or_else(|| PackageError::missing_artifact(locator.orchestrator_name()))?;

        let mut copied = Vec::new();
        copied.push(copy_artifact(core_library, &bin_dir, &prefix)?);
        copied.push(copy_artifact(orchestrator, &bin_dir, &prefix)?);

        let mut warnings = Vec::new();
        for (name, path) in &artifacts.auxiliary_executables {
            match path {
                Some(path) => copied.push(copy_artifact(path, &bin_dir, &prefix)?),
                None => {
                    let msg = format!(
                        "auxiliary executable {} not found; bundled runtime will rely on the host for it",
                        name
                    );
                    warn!("{}", msg);
                    warnings.push(msg);
                }
            }
        }

        self.writer.write_atomic(scratch.path(), &archive)?;
        let digest = xxh3_hex(&fs::read(&archive)?);
        info!(
            "Injected {} artifact(s) into {} ({} warning(s))",
            copied.len(),
            archive.display(),
            warnings.len()
        );

        Ok(InjectReport {
            archive,
            platform,
            bundled_prefix: prefix,
            copied,
            warnings,
            digest,
        })
    }
}

/// Copy `src` into `bin_dir`, returning its in-archive path
fn copy_artifact(src: &Path, bin_dir: &Path, prefix: &str) -> PackageResult<String> {
    let name = src
        .file_name()
        .ok_or_else(|| PackageError::missing_artifact(src.display().to_string()))?;
    let dest: PathBuf = bin_dir.join(name);
    fs::copy(src, &dest).map_err(|source| PackageError::Copy {
        from: src.to_path_buf(),
        source,
    })?;
    Ok(format!("{}/bin/{}", prefix, name.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpirt_platform::PlatformTag;
    use tempfile::tempdir;

    fn seed_archive(dest_dir: &Path, name: &str) -> PathBuf {
        let tree = tempdir().unwrap();
        fs::create_dir_all(tree.path().join("wt")).unwrap();
        fs::write(tree.path().join("wt/__init__"), b"init").unwrap();
        let archive = dest_dir.join(name);
        PackageWriter::new().write_atomic(tree.path(), &archive).unwrap();
        archive
    }

    fn install(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file.as_bytes()).unwrap();
        }
    }

    fn options() -> InjectOptions {
        InjectOptions::new("wt").platform(PlatformTag::LinuxX86_64)
    }

    #[test]
    fn test_inject_full_runtime() {
        let dist = tempdir().unwrap();
        let host = tempdir().unwrap();
        let archive = seed_archive(dist.path(), "wt-1.0.pkg.tar.zst");
        install(host.path(), &["lib/libmpi.so.40", "bin/mpirun", "bin/orted", "bin/prted"]);

        let locator = RuntimeLocator::with_roots(PlatformTag::LinuxX86_64, [host.path()]).unwrap();
        let report = ArchiveInjector::with_locator(options(), locator)
            .inject(dist.path())
            .unwrap();

        assert_eq!(report.archive, archive);
        assert!(report.warnings.is_empty());
        assert_eq!(
            report.copied,
            vec![
                "wt/internal_mpi/linux_x86_64/bin/libmpi.so.40",
                "wt/internal_mpi/linux_x86_64/bin/mpirun",
                "wt/internal_mpi/linux_x86_64/bin/orted",
                "wt/internal_mpi/linux_x86_64/bin/prted",
            ]
        );

        let listing = PackageReader::list(&archive).unwrap();
        assert!(listing.contains("wt/__init__"));
        assert!(listing.contains("wt/internal_mpi/linux_x86_64/lib"));
        assert!(listing.contains("wt/internal_mpi/linux_x86_64/include"));
        assert_eq!(listing.digest, report.digest);
    }

    #[test]
    fn test_missing_core_library_aborts() {
        let dist = tempdir().unwrap();
        let host = tempdir().unwrap();
        let archive = seed_archive(dist.path(), "wt-1.0.pkg.tar.zst");
        let before = fs::read(&archive).unwrap();
        install(host.path(), &["bin/mpirun"]);

        let locator = RuntimeLocator::with_roots(PlatformTag::LinuxX86_64, [host.path()]).unwrap();
        let err = ArchiveInjector::with_locator(options(), locator)
            .inject(dist.path())
            .unwrap_err();

        assert!(matches!(err, PackageError::MissingArtifact { ref name } if name == "libmpi.so.40"));
        assert_eq!(fs::read(&archive).unwrap(), before);
    }

    #[test]
    fn test_missing_orchestrator_aborts() {
        let dist = tempdir().unwrap();
        let host = tempdir().unwrap();
        let archive = seed_archive(dist.path(), "wt-1.0.pkg.tar.zst");
        let before = fs::read(&archive).unwrap();
        install(host.path(), &["lib/libmpi.so.40", "bin/orted"]);

        let locator = RuntimeLocator::with_roots(PlatformTag::LinuxX86_64, [host.path()]).unwrap();
        let err = ArchiveInjector::with_locator(options(), locator)
            .inject(dist.path())
            .unwrap_err();

        assert!(matches!(err, PackageError::MissingArtifact { ref name } if name == "mpirun"));
        assert_eq!(fs::read(&archive).unwrap(), before);
    }

    #[test]
    fn test_unsupported_platform() {
        let dist = tempdir().unwrap();
        seed_archive(dist.path(), "wt-1.0.pkg.tar.zst");

        let injector = ArchiveInjector::new(InjectOptions::new("wt").platform(PlatformTag::Unsupported));
        let err = injector.inject(dist.path()).unwrap_err();
        assert!(matches!(err, PackageError::UnsupportedPlatform { .. }));
    }

    #[test]
    fn test_windows_layout() {
        let dist = tempdir().unwrap();
        let host = tempdir().unwrap();
        let archive = seed_archive(dist.path(), "wt-1.0.pkg.tar.zst");
        install(host.path(), &["bin/msmpi.dll", "bin/mpiexec.exe", "bin/smpd.exe"]);

        let locator = RuntimeLocator::with_roots(PlatformTag::WindowsAmd64, [host.path()]).unwrap();
        let report = ArchiveInjector::with_locator(
            InjectOptions::new("wt").platform(PlatformTag::WindowsAmd64),
            locator,
        )
        .inject(dist.path())
        .unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("msmpilaunchsvc.exe"));
        let listing = PackageReader::list(&archive).unwrap();
        assert!(listing.contains("wt/internal_mpi/windows_amd64/bin/msmpi.dll"));
        assert!(listing.contains("wt/internal_mpi/windows_amd64/bin/mpiexec.exe"));
        assert!(listing.contains("wt/internal_mpi/windows_amd64/bin/smpd.exe"));
    }
}
