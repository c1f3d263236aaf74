//! Package archive writer
//!
//! Packs a directory tree into a .pkg.tar.zst archive. Output depends only on
//! the tree's relative paths, contents and executable bits:
//!
//! - entries sorted by relative path (`/`-separated)
//! - mtime, uid and gid zeroed; no user or group names
//! - mode 0755 for directories and executables, 0644 otherwise
//! - fixed zstd level
//!
//! Symlinks are followed and stored as regular files so the archive never
//! references host paths. Symlinked directories and dangling links are
//! rejected.

use crate::error::{PackageError, PackageResult};
use crate::types::ZSTD_LEVEL;
use std::fs::{self, File, Metadata, Permissions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writer for package archives
#[derive(Debug, Clone)]
pub struct PackageWriter {
    level: i32,
}

#[derive(Debug)]
struct TreeEntry {
    relative: String,
    absolute: PathBuf,
    is_dir: bool,
    mode: u32,
    size: u64,
}

impl PackageWriter {
    /// Writer with the default compression level
    pub fn new() -> Self {
        PackageWriter { level: ZSTD_LEVEL }
    }

    /// Pack `root` and atomically replace `dest` with the result.
    ///
    /// The archive is written to a temporary file next to `dest`, synced,
    /// then renamed over it. On any error `dest` is left as it was. The
    /// result keeps the permissions of the file it replaces; a new archive
    /// gets 0644 on Unix.
    pub fn write_atomic(&self, root: &Path, dest: &Path) -> PackageResult<()> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| PackageError::repack(format!("create temp file in {}: {}", dir.display(), e)))?;
        {
            let out = BufWriter::new(tmp.as_file_mut());
            let mut out = self.write_to(root, out)?;
            out.flush()
                .map_err(|e| PackageError::repack(format!("flush: {}", e)))?;
        }
        if let Some(perms) = target_permissions(dest) {
            tmp.as_file()
                .set_permissions(perms)
                .map_err(|e| PackageError::repack(format!("set permissions: {}", e)))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| PackageError::repack(format!("sync: {}", e)))?;
        tmp.persist(dest).map_err(|e| {
            PackageError::repack(format!("replace {}: {}", dest.display(), e.error))
        })?;

        debug!("Wrote package archive {}", dest.display());
        Ok(())
    }

    /// Pack `root` into `out`, returning `out` once the stream is finished
    pub fn write_to<W: Write>(&self, root: &Path, out: W) -> PackageResult<W> {
        let entries = collect_tree(root)?;

        let encoder = zstd::Encoder::new(out, self.level)
            .map_err(|e| PackageError::compression(format!("zstd encode: {}", e)))?;
        let mut builder = Builder::new(encoder);

        for entry in &entries {
            let mut header = Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            header.set_mode(entry.mode);

            let result = if entry.is_dir {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                builder.append_data(&mut header, &entry.relative, std::io::empty())
            } else {
                header.set_entry_type(EntryType::Regular);
                header.set_size(entry.size);
                let file = File::open(&entry.absolute)
                    .map_err(|e| PackageError::repack(format!("{}: {}", entry.relative, e)))?;
                builder.append_data(&mut header, &entry.relative, file)
            };
            result.map_err(|e| PackageError::repack(format!("{}: {}", entry.relative, e)))?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| PackageError::repack(format!("finish tar stream: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| PackageError::compression(format!("zstd finish: {}", e)))
    }
}

impl Default for PackageWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Permissions the replacement archive should carry
fn target_permissions(dest: &Path) -> Option<Permissions> {
    match fs::metadata(dest) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => new_archive_permissions(),
    }
}

#[cfg(unix)]
fn new_archive_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_archive_permissions() -> Option<Permissions> {
    None
}

/// Walk `root` and return every entry sorted by relative path
fn collect_tree(root: &Path) -> PackageResult<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    walk(root, root, &mut entries)?;
    entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(entries)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<TreeEntry>) -> PackageResult<()> {
    let read = fs::read_dir(dir)
        .map_err(|e| PackageError::repack(format!("read {}: {}", dir.display(), e)))?;

    for entry in read {
        let entry = entry.map_err(|e| PackageError::repack(e.to_string()))?;
        let path = entry.path();
        let relative = relative_name(root, &path)?;
        let file_type = entry
            .file_type()
            .map_err(|e| PackageError::repack(format!("{}: {}", relative, e)))?;

        if file_type.is_symlink() {
            let target = fs::metadata(&path).map_err(|e| {
                PackageError::repack(format!("dangling link {}: {}", relative, e))
            })?;
            if target.is_dir() {
                return Err(PackageError::repack(format!(
                    "symlinked directory not supported: {}",
                    relative
                )));
            }
            out.push(file_entry(relative, path, &target));
        } else if file_type.is_dir() {
            out.push(TreeEntry {
                relative,
                absolute: path.clone(),
                is_dir: true,
                mode: 0o755,
                size: 0,
            });
            walk(root, &path, out)?;
        } else {
            let meta = entry
                .metadata()
                .map_err(|e| PackageError::repack(format!("{}: {}", relative, e)))?;
            out.push(file_entry(relative, path, &meta));
        }
    }

    Ok(())
}

fn file_entry(relative: String, absolute: PathBuf, meta: &Metadata) -> TreeEntry {
    let mode = if is_executable(&absolute, meta) { 0o755 } else { 0o644 };
    TreeEntry {
        relative,
        absolute,
        is_dir: false,
        mode,
        size: meta.len(),
    }
}

fn relative_name(root: &Path, path: &Path) -> PackageResult<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| PackageError::repack(format!("{}: {}", path.display(), e)))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn is_executable(_path: &Path, meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(path: &Path, _meta: &Metadata) -> bool {
    matches!(
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .as_deref(),
        Some("exe" | "dll" | "bat" | "cmd")
    )
}
