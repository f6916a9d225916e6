//! Small client-side cache of `read` responses.
//!
//! Entries are keyed by resolved server path, newest first. The cache holds
//! at most `capacity` entries; inserting beyond that evicts the oldest.
//! Entries expire `ttl` after insertion.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::constants::{CACHE_CAPACITY, CACHE_TTL};

#[derive(Debug, Clone)]
struct CacheEntry {
    path: String,
    contents: String,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache {
    entries: VecDeque<CacheEntry>,
    capacity: usize,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY, CACHE_TTL)
    }
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            ttl,
        }
    }

    /// Cached contents for `path`, unless missing or expired.
    pub fn get(&self, path: &str) -> Option<&str> {
        let now = Instant::now();
        self.entries
            .iter()
            .find(|e| e.path == path)
            .filter(|e| now.duration_since(e.inserted_at) < self.ttl)
            .map(|e| e.contents.as_str())
    }

    /// Insert as the newest entry, replacing any older entry for the path.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        let path = path.into();
        self.entries.retain(|e| e.path != path);
        self.entries.push_front(CacheEntry {
            path,
            contents: contents.into(),
            inserted_at: Instant::now(),
        });
        self.entries.truncate(self.capacity);
    }

    /// Drop the entry for `path`. Returns whether one was present.
    pub fn invalidate(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path != path);
        before != self.entries.len()
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|e| now.duration_since(e.inserted_at) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
