//! Path-keyed exclusive locks.
//!
//! Records are keyed by the normalized resolved path, so at most one record
//! per path can exist however the path was spelled. Owners are referenced by session id only; [`LockTable::sweep`]
//! reconciles those references against the live session set.
//!
//! The table itself is not synchronized. The manager keeps it behind the
//! same mutex as the session table, which makes every check-then-insert here
//! atomic with respect to other workers.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use serde::Serialize;

use crate::resolve::{is_within, normalize};
use crate::types::SessionId;

/// An exclusive claim on one resolved path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockRecord {
    pub owner: SessionId,
    pub acquired_at: SystemTime,
    /// Normalized path.
    pub path: String,
}

/// Result of [`LockTable::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Locked,
    AlreadyLocked,
}

/// Result of [`LockTable::claim`], which distinguishes who holds the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now holds a fresh lock and is responsible for releasing it.
    Acquired,
    /// The caller already held the lock before this call.
    AlreadyOwned,
    HeldByOther(SessionId),
}

/// Result of [`LockTable::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Released,
    NotHeld,
}

#[derive(Debug, Default)]
pub struct LockTable {
    records: HashMap<String, LockRecord>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.records.contains_key(&normalize(path))
    }

    /// The session holding `path`, if any.
    pub fn holder(&self, path: &str) -> Option<SessionId> {
        self.records.get(&normalize(path)).map(|r| r.owner)
    }

    /// Lock `path` for `owner` unless any record exists for it, including
    /// one already owned by `owner`.
    pub fn acquire(&mut self, owner: SessionId, path: &str) -> Acquire {
        if self.is_locked(path) {
            return Acquire::AlreadyLocked;
        }
        self.insert(owner, path);
        Acquire::Locked
    }

    /// Re-entrant acquire used around single-shot mutations.
    pub fn claim(&mut self, owner: SessionId, path: &str) -> Claim {
        match self.holder(path) {
            Some(holder) if holder == owner => Claim::AlreadyOwned,
            Some(holder) => Claim::HeldByOther(holder),
            None => {
                self.insert(owner, path);
                Claim::Acquired
            }
        }
    }

    /// Remove the record for `path` only if `owner` holds it.
    pub fn release(&mut self, owner: SessionId, path: &str) -> Release {
        if self.holder(path) != Some(owner) {
            return Release::NotHeld;
        }
        self.records.remove(&normalize(path));
        Release::Released
    }

    /// Drop every record whose owner is not in `live`. Returns how many were
    /// dropped.
    pub fn sweep(&mut self, live: &HashSet<SessionId>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| live.contains(&r.owner));
        before - self.records.len()
    }

    /// Drop every record owned by `owner`. Returns how many were dropped.
    pub fn release_all(&mut self, owner: SessionId) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.owner != owner);
        before - self.records.len()
    }

    /// Whether any locked path lies inside the directory `dir`.
    pub fn any_within(&self, dir: &str) -> bool {
        self.records.keys().any(|path| is_within(path, dir))
    }

    /// Snapshot of the current records, ordered by path.
    pub fn records(&self) -> Vec<LockRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&mut self, owner: SessionId, path: &str) {
        let path = normalize(path);
        self.records.insert(
            path.clone(),
            LockRecord {
                owner,
                acquired_at: SystemTime::now(),
                path,
            },
        );
    }
}
