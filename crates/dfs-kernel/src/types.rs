//! Core manager types.
//!
//! Every facade operation answers with one of the small closed enums below.
//! The protocol layer maps each variant 1:1 onto a fixed response text, so
//! adding a variant is a wire-visible change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A session identifier, assigned monotonically from zero.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a resolved path names on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Nothing exists at the path.
    Absent,
}

impl ItemKind {
    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, ItemKind::Directory)
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type. Never `Absent`.
    pub kind: ItemKind,
}

impl ListEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::File,
        }
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Directory,
        }
    }

    /// Single-letter tag used by the listing table (`f` or `d`).
    pub fn tag(&self) -> char {
        if self.kind.is_dir() { 'd' } else { 'f' }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDirOutcome {
    Changed,
    NoSuchDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveUpOutcome {
    Changed,
    /// The session is already at the root segment; nothing changed.
    AtRoot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    /// Immediate children in filesystem enumeration order.
    Listing(Vec<ListEntry>),
    NotFound,
    /// The name refers to a file.
    NotAListing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Content { path: String, contents: String },
    NotFound,
    IsADirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Another session holds the lock.
    Locked,
    IsADirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Another session holds the lock.
    Locked,
    IsADirectory,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Locked,
    AlreadyLocked,
    NotFound,
    IsADirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// No lock on the path is owned by the caller.
    NotHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MkdirOutcome {
    Created,
    FileExists,
    DirExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmdirOutcome {
    Removed,
    NotFound,
    IsAFile,
    /// A locked path lies inside the directory.
    HasLockedContents,
}
