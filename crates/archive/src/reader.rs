//! Package archive reader
//!
//! Locates, lists and unpacks .pkg.tar.zst archives.

use crate::error::{PackageError, PackageResult};
use crate::types::{xxh3_hex, ArchiveListing, EntryInfo, PACKAGE_EXTENSION};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tar::Archive;

/// Reader for package archives
pub struct PackageReader;

impl PackageReader {
    /// Find the single package archive for `package_name` in `dir`.
    ///
    /// Candidates are regular files named `<package_name>-<version>.pkg.tar.zst`.
    /// Zero or several candidates is an error; nothing is guessed.
    pub fn find_unique(dir: &Path, package_name: &str) -> PackageResult<PathBuf> {
        let prefix = format!("{}-", package_name);
        let mut found = Vec::new();
        if dir.is_dir() {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with(&prefix)
                    && name.ends_with(PACKAGE_EXTENSION)
                    && entry.file_type()?.is_file()
                {
                    found.push(entry.path());
                }
            }
        }
        found.sort();

        if found.len() == 1 {
            Ok(found.remove(0))
        } else {
            Err(PackageError::NoUnambiguousTarget {
                dir: dir.to_path_buf(),
                found,
            })
        }
    }

    /// List every entry with its size
    pub fn list(path: &Path) -> PackageResult<ArchiveListing> {
        let data = fs::read(path)?;
        let entries = Self::list_from_bytes(&data)?;
        Ok(ArchiveListing {
            archive: path.to_path_buf(),
            entries,
            digest: xxh3_hex(&data),
        })
    }

    /// List entries of an in-memory archive
    pub fn list_from_bytes(data: &[u8]) -> PackageResult<Vec<EntryInfo>> {
        let decoder = zstd::Decoder::new(data)
            .map_err(|e| PackageError::compression(format!("zstd decode: {}", e)))?;
        let mut archive = Archive::new(decoder);
        let mut entries = Vec::new();

        for entry in archive.entries().map_err(|e| PackageError::archive(e.to_string()))? {
            let entry = entry.map_err(|e| PackageError::archive(e.to_string()))?;
            let path = entry
                .path()
                .map_err(|e| PackageError::archive(e.to_string()))?
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();
            let header = entry.header();
            entries.push(EntryInfo {
                path,
                size: header.size().map_err(|e| PackageError::archive(e.to_string()))?,
                is_dir: header.entry_type().is_dir(),
            });
        }

        Ok(entries)
    }

    /// Read a single file out of the archive
    pub fn read_file(path: &Path, entry_path: &str) -> PackageResult<Vec<u8>> {
        let file = File::open(path)?;
        let decoder = zstd::Decoder::new(BufReader::new(file))
            .map_err(|e| PackageError::compression(format!("zstd decode: {}", e)))?;
        let mut archive = Archive::new(decoder);

        for entry in archive.entries().map_err(|e| PackageError::archive(e.to_string()))? {
            let mut entry = entry.map_err(|e| PackageError::archive(e.to_string()))?;
            let name = entry
                .path()
                .map_err(|e| PackageError::archive(e.to_string()))?
                .to_string_lossy()
                .to_string();

            if name == entry_path {
                let mut data = Vec::new();
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| PackageError::archive(format!("read {}: {}", entry_path, e)))?;
                return Ok(data);
            }
        }

        Err(PackageError::archive(format!("entry not found: {}", entry_path)))
    }

    /// Unpack every entry under `dest`.
    ///
    /// Entries that would land outside `dest` abort the extraction.
    pub fn extract_to(path: &Path, dest: &Path) -> PackageResult<()> {
        let file = File::open(path)?;
        let decoder = zstd::Decoder::new(BufReader::new(file))
            .map_err(|e| PackageError::extract(format!("zstd decode: {}", e)))?;
        let mut archive = Archive::new(decoder);

        for entry in archive.entries().map_err(|e| PackageError::extract(e.to_string()))? {
            let mut entry = entry.map_err(|e| PackageError::extract(e.to_string()))?;
            let name = entry
                .path()
                .map_err(|e| PackageError::extract(e.to_string()))?
                .to_string_lossy()
                .to_string();

            let unpacked = entry
                .unpack_in(dest)
                .map_err(|e| PackageError::extract(format!("{}: {}", name, e)))?;
            if !unpacked {
                return Err(PackageError::extract(format!(
                    "entry escapes archive root: {}",
                    name
                )));
            }
        }

        Ok(())
    }
}
