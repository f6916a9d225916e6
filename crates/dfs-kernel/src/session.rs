//! Client sessions and the table that owns them.
//!
//! A `Session` is one connected client's navigation state: its id and a
//! directory stack that always starts with the configured root segment.
//! Sessions are mutated in place through [`SessionTable::get_mut`]; the
//! manager serializes that access behind its state lock.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::types::SessionId;

/// One connected client's navigation state.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    /// Directory stack, root segment first. Never empty.
    dirs: Vec<String>,
    /// Cancelled when the manager disconnects the session.
    hangup: CancellationToken,
    peer: Option<SocketAddr>,
    connected_at: SystemTime,
}

impl Session {
    fn new(id: SessionId, root: &str, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            dirs: vec![root.to_string()],
            hangup: CancellationToken::new(),
            peer,
            connected_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Directory stack segments, root first.
    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.dirs.len() - 1
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }

    /// Token the connection layer waits on to learn the session was closed.
    pub fn hangup_token(&self) -> CancellationToken {
        self.hangup.clone()
    }

    /// Push a directory onto the stack.
    pub fn push_dir(&mut self, name: impl Into<String>) {
        self.dirs.push(name.into());
    }

    /// Pop one directory. Returns false (and changes nothing) at the root.
    pub fn pop_dir(&mut self) -> bool {
        if self.dirs.len() > 1 {
            self.dirs.pop();
            true
        } else {
            false
        }
    }

    fn hang_up(&self) {
        self.hangup.cancel();
    }
}

/// Owns every active session.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
    next_id: u64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and insert a session rooted at `root`.
    pub fn create(&mut self, root: &str, peer: Option<SocketAddr>) -> SessionId {
        let id = SessionId::from(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, Session::new(id, root, peer));
        id
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Remove a session and cancel its hangup token. Idempotent.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        session.hang_up();
        Some(session)
    }

    pub fn exists(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Snapshot of the live ids, as consumed by the lock sweep.
    pub fn ids(&self) -> HashSet<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
