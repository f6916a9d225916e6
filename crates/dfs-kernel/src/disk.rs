//! Real filesystem access.
//!
//! All operations take a resolved, server-relative path and interpret it
//! under `base`. No containment is enforced here; confinement, when wanted,
//! is checked by the manager before any call reaches this type.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::types::{ItemKind, ListEntry};

#[derive(Debug, Clone)]
pub struct Disk {
    base: PathBuf,
}

impl Disk {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// On-disk location of a resolved path.
    pub fn locate(&self, resolved: &str) -> PathBuf {
        self.base.join(resolved)
    }

    /// Classify a resolved path. Follows symlinks.
    ///
    /// Anything that cannot be stat'ed counts as absent, including a path
    /// that runs through a regular file.
    pub async fn kind(&self, resolved: &str) -> ItemKind {
        Self::kind_at(&self.locate(resolved)).await
    }

    async fn kind_at(full: &Path) -> ItemKind {
        match fs::metadata(full).await {
            Ok(meta) if meta.is_dir() => ItemKind::Directory,
            Ok(_) => ItemKind::File,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(path = %full.display(), error = %e, "stat failed, treating as absent");
                }
                ItemKind::Absent
            }
        }
    }

    /// Immediate children of a directory, in enumeration order.
    ///
    /// Entries that vanish mid-listing or cannot be stat'ed (dangling
    /// symlinks) are skipped.
    pub async fn list(&self, resolved: &str) -> io::Result<Vec<ListEntry>> {
        let full = self.locate(resolved);
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match Self::kind_at(&entry.path()).await {
                ItemKind::File => entries.push(ListEntry::file(name)),
                ItemKind::Directory => entries.push(ListEntry::directory(name)),
                ItemKind::Absent => {}
            }
        }

        Ok(entries)
    }

    /// Whole-file read. Invalid UTF-8 is replaced rather than rejected.
    pub async fn read(&self, resolved: &str) -> io::Result<String> {
        let bytes = fs::read(self.locate(resolved)).await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    /// Create or truncate, then write the full contents.
    pub async fn write(&self, resolved: &str, contents: &str) -> io::Result<()> {
        fs::write(self.locate(resolved), contents).await
    }

    pub async fn remove_file(&self, resolved: &str) -> io::Result<()> {
        fs::remove_file(self.locate(resolved)).await
    }

    /// Create a directory and any missing parents.
    pub async fn create_dir(&self, resolved: &str) -> io::Result<()> {
        fs::create_dir_all(self.locate(resolved)).await
    }

    /// Remove a directory and everything under it.
    pub async fn remove_dir(&self, resolved: &str) -> io::Result<()> {
        fs::remove_dir_all(self.locate(resolved)).await
    }
}
