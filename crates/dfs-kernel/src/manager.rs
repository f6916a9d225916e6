//! The file system manager.
//!
//! `FileSystemManager` is shared (behind an `Arc`) by every connection
//! worker. The session table and lock table live together behind one mutex
//! so that resolution, lock checks and lock inserts never interleave across
//! workers. The guard is always dropped before disk I/O is awaited.
//!
//! Locks are advisory: `write` and `delete` take and drop their own lock
//! around the mutation, so explicit `lock` only keeps *other* sessions out.
//! Locks held by a session that disappears are reclaimed by the periodic
//! sweep (see [`FileSystemManager::spawn_sweeper`]), not on disconnect.
//!
//! With `confine_to_root` set, every operation that touches the disk checks
//! the name twice: lexically at resolution, then against the canonical
//! location of the root so that symlinks cannot lead outside it.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::events::{Event, EventLog};
use crate::locks::{Acquire, Claim, LockRecord, LockTable, Release};
use crate::resolve;
use crate::session::SessionTable;
use crate::types::{
    ChangeDirOutcome, DeleteOutcome, ItemKind, ListOutcome, LockOutcome, MkdirOutcome,
    MoveUpOutcome, ReadOutcome, ReleaseOutcome, RmdirOutcome, SessionId, WriteOutcome,
};

/// Default root segment every session starts in.
pub const DEFAULT_ROOT: &str = "FileSystemDir";

/// Default period of the abandoned-lock sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Root segment; first entry of every directory stack.
    pub root: String,
    /// Directory the root segment is interpreted under.
    pub base_dir: PathBuf,
    pub sweep_interval: Duration,
    /// Reject item names that would leave the root segment, lexically or
    /// through a symlink.
    pub confine_to_root: bool,
    /// Drop a session's locks as soon as it disconnects. The sweep still
    /// runs either way.
    pub release_on_disconnect: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            base_dir: PathBuf::from("."),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            confine_to_root: false,
            release_on_disconnect: false,
        }
    }
}

impl ManagerConfig {
    /// Config rooted at `root` under `base_dir`, other fields defaulted.
    pub fn new(base_dir: impl Into<PathBuf>, root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

/// The single exclusion domain for sessions and locks.
#[derive(Debug, Default)]
struct Tables {
    sessions: SessionTable,
    locks: LockTable,
}

#[derive(Debug)]
pub struct FileSystemManager {
    config: ManagerConfig,
    disk: Disk,
    tables: Mutex<Tables>,
    events: Mutex<EventLog>,
}

impl FileSystemManager {
    pub fn new(config: ManagerConfig) -> Self {
        let disk = Disk::new(config.base_dir.clone());
        Self {
            config,
            disk,
            tables: Mutex::new(Tables::default()),
            events: Mutex::new(EventLog::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn root(&self) -> &str {
        &self.config.root
    }

    /// Create the root directory on disk if it is missing.
    pub async fn ensure_root(&self) -> FsResult<()> {
        self.disk.create_dir(&self.config.root).await?;
        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Register a new client. The returned token is cancelled when the
    /// session is disconnected.
    pub fn connect(&self, peer: Option<SocketAddr>) -> (SessionId, CancellationToken) {
        let mut tables = self.tables.lock();
        let id = tables.sessions.create(&self.config.root, peer);
        let token = tables
            .sessions
            .get(id)
            .map(|s| s.hangup_token())
            .unwrap_or_default();
        drop(tables);

        match peer {
            Some(addr) => tracing::info!(session = %id, peer = %addr, "client connected"),
            None => tracing::info!(session = %id, "client connected"),
        }
        (id, token)
    }

    /// Remove the session and hang up its connection. Unknown ids are
    /// ignored.
    ///
    /// Locks stay in place until the next sweep unless
    /// `release_on_disconnect` is set.
    pub fn disconnect(&self, id: SessionId) {
        let mut tables = self.tables.lock();
        let Some(session) = tables.sessions.remove(id) else {
            return;
        };
        let released = if self.config.release_on_disconnect {
            tables.locks.release_all(id)
        } else {
            0
        };
        drop(tables);

        if released > 0 {
            tracing::debug!(session = %id, released, "released locks on disconnect");
        }
        let connected_secs = session
            .connected_at()
            .elapsed()
            .unwrap_or_default()
            .as_secs();
        match session.peer() {
            Some(addr) => tracing::info!(session = %id, peer = %addr, connected_secs, "client disconnected"),
            None => tracing::info!(session = %id, connected_secs, "client disconnected"),
        }
        self.record(format!("disconnect client {id}"));
    }

    pub fn session_exists(&self, id: SessionId) -> bool {
        self.tables.lock().sessions.exists(id)
    }

    pub fn session_count(&self) -> usize {
        self.tables.lock().sessions.len()
    }

    // ========================================================================
    // Observability
    // ========================================================================

    pub fn is_locked(&self, path: &str) -> bool {
        self.tables.lock().locks.is_locked(path)
    }

    pub fn lock_records(&self) -> Vec<LockRecord> {
        self.tables.lock().locks.records()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().all().to_vec()
    }

    pub fn recent_events(&self, limit: usize) -> Vec<Event> {
        self.events.lock().recent(limit).to_vec()
    }

    fn record(&self, description: impl Into<String>) {
        self.events.lock().record(description);
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve `name` against the session's working directory.
    pub fn resolve(&self, id: SessionId, name: &str) -> FsResult<String> {
        let tables = self.tables.lock();
        let session = tables
            .sessions
            .get(id)
            .ok_or(FsError::UnknownSession(id))?;
        if self.config.confine_to_root && resolve::escapes_root(session, name) {
            return Err(FsError::path_escapes_root(name));
        }
        Ok(resolve::resolve(session, name))
    }

    pub fn working_directory(&self, id: SessionId) -> FsResult<String> {
        self.resolve(id, "")
    }

    /// Resolve `name` for an operation that goes to disk.
    async fn locate(&self, id: SessionId, name: &str) -> FsResult<String> {
        let path = self.resolve(id, name)?;
        if self.config.confine_to_root {
            self.check_real_path(name, &path).await?;
        }
        Ok(path)
    }

    /// Follow symlinks in `path` and fail unless it stays under the root.
    ///
    /// Names that do not exist yet are checked through their deepest existing
    /// ancestor. A dangling symlink on the way is refused outright.
    async fn check_real_path(&self, name: &str, path: &str) -> FsResult<()> {
        let root = fs::canonicalize(self.disk.locate(&self.config.root)).await?;
        let mut candidate = self.disk.locate(path);
        let real = loop {
            match fs::canonicalize(&candidate).await {
                Ok(real) => break real,
                Err(e) => {
                    if is_symlink(&candidate).await {
                        return Err(FsError::path_escapes_root(name));
                    }
                    if !candidate.pop() {
                        return Err(e.into());
                    }
                }
            }
        };

        if !real.starts_with(&root) {
            tracing::warn!(path = %path, real = %real.display(), "path leaves the root");
            return Err(FsError::path_escapes_root(name));
        }
        Ok(())
    }

    pub async fn item_kind(&self, id: SessionId, name: &str) -> FsResult<ItemKind> {
        let path = self.locate(id, name).await?;
        Ok(self.disk.kind(&path).await)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub async fn change_directory(&self, id: SessionId, name: &str) -> FsResult<ChangeDirOutcome> {
        if self.item_kind(id, name).await? != ItemKind::Directory {
            return Ok(ChangeDirOutcome::NoSuchDirectory);
        }
        if is_current_dir(name) {
            return Ok(ChangeDirOutcome::Changed);
        }

        self.tables
            .lock()
            .sessions
            .get_mut(id)
            .ok_or(FsError::UnknownSession(id))?
            .push_dir(name);

        self.record(format!("cd {name}"));
        Ok(ChangeDirOutcome::Changed)
    }

    pub fn move_up(&self, id: SessionId) -> FsResult<MoveUpOutcome> {
        let popped = self
            .tables
            .lock()
            .sessions
            .get_mut(id)
            .ok_or(FsError::UnknownSession(id))?
            .pop_dir();

        if !popped {
            return Ok(MoveUpOutcome::AtRoot);
        }
        self.record("up");
        Ok(MoveUpOutcome::Changed)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// List a directory. An empty `name` lists the working directory.
    pub async fn list(&self, id: SessionId, name: &str) -> FsResult<ListOutcome> {
        let path = self.locate(id, name).await?;
        match self.disk.kind(&path).await {
            ItemKind::Absent => Ok(ListOutcome::NotFound),
            ItemKind::File => Ok(ListOutcome::NotAListing),
            ItemKind::Directory => Ok(ListOutcome::Listing(self.disk.list(&path).await?)),
        }
    }

    pub async fn read(&self, id: SessionId, name: &str) -> FsResult<ReadOutcome> {
        let path = self.locate(id, name).await?;
        match self.disk.kind(&path).await {
            ItemKind::Absent => Ok(ReadOutcome::NotFound),
            ItemKind::Directory => Ok(ReadOutcome::IsADirectory),
            ItemKind::File => {
                let contents = self.disk.read(&path).await?;
                self.record(format!("read {path}"));
                Ok(ReadOutcome::Content { path, contents })
            }
        }
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create or fully overwrite a file.
    ///
    /// The write takes the path's lock for its own duration. If the session
    /// already held the lock it keeps holding it afterwards.
    pub async fn write(&self, id: SessionId, name: &str, contents: &str) -> FsResult<WriteOutcome> {
        let path = self.locate(id, name).await?;
        if self.disk.kind(&path).await.is_dir() {
            return Ok(WriteOutcome::IsADirectory);
        }

        let claim = self.tables.lock().locks.claim(id, &path);
        if let Claim::HeldByOther(holder) = claim {
            tracing::debug!(session = %id, %holder, path = %path, "write blocked by lock");
            return Ok(WriteOutcome::Locked);
        }

        let result = self.disk.write(&path, contents).await;
        if claim == Claim::Acquired {
            self.tables.lock().locks.release(id, &path);
        }
        result?;

        self.record(format!("write {path}"));
        Ok(WriteOutcome::Written)
    }

    /// Delete a file, under the same lock discipline as [`Self::write`].
    pub async fn delete(&self, id: SessionId, name: &str) -> FsResult<DeleteOutcome> {
        let path = self.locate(id, name).await?;
        match self.disk.kind(&path).await {
            ItemKind::Absent => return Ok(DeleteOutcome::NotFound),
            ItemKind::Directory => return Ok(DeleteOutcome::IsADirectory),
            ItemKind::File => {}
        }

        let claim = self.tables.lock().locks.claim(id, &path);
        if let Claim::HeldByOther(holder) = claim {
            tracing::debug!(session = %id, %holder, path = %path, "delete blocked by lock");
            return Ok(DeleteOutcome::Locked);
        }

        let result = self.disk.remove_file(&path).await;
        if claim == Claim::Acquired {
            self.tables.lock().locks.release(id, &path);
        }
        result?;

        self.record(format!("delete {path}"));
        Ok(DeleteOutcome::Deleted)
    }

    // ========================================================================
    // Locking
    // ========================================================================

    /// Explicitly lock an existing file.
    pub async fn lock(&self, id: SessionId, name: &str) -> FsResult<LockOutcome> {
        let path = self.locate(id, name).await?;
        match self.disk.kind(&path).await {
            ItemKind::Absent => return Ok(LockOutcome::NotFound),
            ItemKind::Directory => return Ok(LockOutcome::IsADirectory),
            ItemKind::File => {}
        }

        match self.tables.lock().locks.acquire(id, &path) {
            Acquire::AlreadyLocked => return Ok(LockOutcome::AlreadyLocked),
            Acquire::Locked => {}
        }
        self.record(format!("lock {path}"));
        Ok(LockOutcome::Locked)
    }

    /// Release a lock the session holds. Never touches another session's
    /// lock.
    pub fn release_lock(&self, id: SessionId, name: &str) -> FsResult<ReleaseOutcome> {
        let path = self.resolve(id, name)?;
        match self.tables.lock().locks.release(id, &path) {
            Release::NotHeld => return Ok(ReleaseOutcome::NotHeld),
            Release::Released => {}
        }
        self.record(format!("release {path}"));
        Ok(ReleaseOutcome::Released)
    }

    /// Drop every lock whose owner session is gone. Returns how many were
    /// dropped.
    pub fn sweep_locks(&self) -> usize {
        let dropped = {
            let mut tables = self.tables.lock();
            let live = tables.sessions.ids();
            tables.locks.sweep(&live)
        };

        if dropped > 0 {
            self.record("lock auto-release");
        }
        tracing::debug!(dropped, "lock sweep finished");
        dropped
    }

    /// Run [`Self::sweep_locks`] every `sweep_interval` until the manager
    /// is dropped or the returned handle is.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let period = self.config.sweep_interval;
        let manager: Weak<Self> = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.sweep_locks();
            }
        });

        tracing::info!(interval_secs = period.as_secs_f64(), "lock sweeper started");
        SweeperHandle { task }
    }

    // ========================================================================
    // Directories
    // ========================================================================

    /// Create a directory, including missing intermediate segments.
    pub async fn make_directory(&self, id: SessionId, name: &str) -> FsResult<MkdirOutcome> {
        let path = self.locate(id, name).await?;
        match self.disk.kind(&path).await {
            ItemKind::File => return Ok(MkdirOutcome::FileExists),
            ItemKind::Directory => return Ok(MkdirOutcome::DirExists),
            ItemKind::Absent => {}
        }

        self.disk.create_dir(&path).await?;
        self.record(format!("mkdir {path}"));
        Ok(MkdirOutcome::Created)
    }

    /// Recursively remove a directory that contains no locked paths.
    ///
    /// Neither the working directory nor any of its ancestors is removable
    /// this way, however the name is spelled (`""`, `.`, `d/..`).
    pub async fn remove_directory(&self, id: SessionId, name: &str) -> FsResult<RmdirOutcome> {
        let path = self.locate(id, name).await?;
        let cwd = self.working_directory(id)?;
        if resolve::encloses(&path, &cwd) {
            return Ok(RmdirOutcome::NotFound);
        }
        match self.disk.kind(&path).await {
            ItemKind::Absent => return Ok(RmdirOutcome::NotFound),
            ItemKind::File => return Ok(RmdirOutcome::IsAFile),
            ItemKind::Directory => {}
        }

        if self.tables.lock().locks.any_within(&path) {
            return Ok(RmdirOutcome::HasLockedContents);
        }

        self.disk.remove_dir(&path).await?;
        self.record(format!("rmdir {path}"));
        Ok(RmdirOutcome::Removed)
    }
}

fn is_current_dir(name: &str) -> bool {
    matches!(name, "" | "." | "./")
}

async fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .await
        .is_ok_and(|meta| meta.file_type().is_symlink())
}

/// Owns the sweep task; aborts it when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (Arc<FileSystemManager>, TempDir) {
        setup_with(|_| {})
    }

    fn setup_with(tweak: impl FnOnce(&mut ManagerConfig)) -> (Arc<FileSystemManager>, TempDir) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("root")).unwrap();
        let mut config = ManagerConfig::new(dir.path(), "root");
        tweak(&mut config);
        (Arc::new(FileSystemManager::new(config)), dir)
    }

    fn descriptions(manager: &FileSystemManager) -> Vec<String> {
        manager.events().into_iter().map(|e| e.description).collect()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (manager, _dir) = setup();
        let (id, _) = manager.connect(None);

        assert_eq!(manager.write(id, "a.txt", "hello").await.unwrap(), WriteOutcome::Written);
        match manager.read(id, "a.txt").await.unwrap() {
            ReadOutcome::Content { path, contents } => {
                assert_eq!(path, "root/a.txt");
                assert_eq!(contents, "hello");
            }
            other => panic!("unexpected read outcome: {other:?}"),
        }
        assert!(!manager.is_locked("root/a.txt"), "write must drop its own lock");
        assert_eq!(descriptions(&manager), ["write root/a.txt", "read root/a.txt"]);
    }

    #[tokio::test]
    async fn test_write_overwrites_fully() {
        let (manager, dir) = setup();
        let (id, _) = manager.connect(None);

        manager.write(id, "a.txt", "first and longer").await.unwrap();
        manager.write(id, "a.txt", "second").await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("root/a.txt")).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_write_to_directory() {
        let (manager, dir) = setup();
        std::fs::create_dir(dir.path().join("root/sub")).unwrap();
        let (id, _) = manager.connect(None);

        assert_eq!(manager.write(id, "sub", "x").await.unwrap(), WriteOutcome::IsADirectory);
        assert_eq!(manager.write(id, "", "x").await.unwrap(), WriteOutcome::IsADirectory);
    }

    #[tokio::test]
    async fn test_write_blocked_by_other_session() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f.txt"), "original").unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        assert_eq!(manager.lock(a, "f.txt").await.unwrap(), LockOutcome::Locked);
        assert_eq!(manager.write(b, "f.txt", "clobber").await.unwrap(), WriteOutcome::Locked);
        assert_eq!(manager.delete(b, "f.txt").await.unwrap(), DeleteOutcome::Locked);
        assert_eq!(std::fs::read_to_string(dir.path().join("root/f.txt")).unwrap(), "original");
    }

    #[tokio::test]
    async fn test_write_keeps_preexisting_own_lock() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f.txt"), "original").unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        manager.lock(a, "f.txt").await.unwrap();
        assert_eq!(manager.write(a, "f.txt", "mine").await.unwrap(), WriteOutcome::Written);
        assert_eq!(manager.write(a, "f.txt", "still mine").await.unwrap(), WriteOutcome::Written);

        let records = manager.lock_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, a);
        assert_eq!(manager.write(b, "f.txt", "theirs").await.unwrap(), WriteOutcome::Locked);
    }

    #[tokio::test]
    async fn test_delete() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("root/sub")).unwrap();
        let (id, _) = manager.connect(None);

        assert_eq!(manager.delete(id, "missing").await.unwrap(), DeleteOutcome::NotFound);
        assert_eq!(manager.delete(id, "sub").await.unwrap(), DeleteOutcome::IsADirectory);
        assert_eq!(manager.delete(id, "f.txt").await.unwrap(), DeleteOutcome::Deleted);
        assert!(!dir.path().join("root/f.txt").exists());
        assert!(manager.lock_records().is_empty());
        assert_eq!(descriptions(&manager), ["delete root/f.txt"]);
    }

    #[tokio::test]
    async fn test_lock_guards() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("root/sub")).unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        assert_eq!(manager.lock(a, "missing").await.unwrap(), LockOutcome::NotFound);
        assert_eq!(manager.lock(a, "sub").await.unwrap(), LockOutcome::IsADirectory);
        assert_eq!(manager.lock(a, "f.txt").await.unwrap(), LockOutcome::Locked);
        assert_eq!(manager.lock(a, "f.txt").await.unwrap(), LockOutcome::AlreadyLocked);
        assert_eq!(manager.lock(b, "f.txt").await.unwrap(), LockOutcome::AlreadyLocked);
    }

    #[tokio::test]
    async fn test_release_is_owner_restricted() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        assert_eq!(manager.release_lock(b, "f.txt").unwrap(), ReleaseOutcome::NotHeld);
        manager.lock(a, "f.txt").await.unwrap();
        assert_eq!(manager.release_lock(b, "f.txt").unwrap(), ReleaseOutcome::NotHeld);
        assert!(manager.is_locked("root/f.txt"));
        assert_eq!(manager.release_lock(a, "f.txt").unwrap(), ReleaseOutcome::Released);
        assert!(!manager.is_locked("root/f.txt"));
        assert_eq!(descriptions(&manager), ["lock root/f.txt", "release root/f.txt"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lock_has_one_winner() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    let (id, _) = manager.connect(None);
                    manager.lock(id, "f.txt").await.unwrap()
                })
            })
            .collect();

        let outcomes: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let winners = outcomes.iter().filter(|o| **o == LockOutcome::Locked).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, LockOutcome::Locked | LockOutcome::AlreadyLocked)));
        assert_eq!(manager.lock_records().len(), 1);
    }

    #[tokio::test]
    async fn test_move_up_at_root_is_noop() {
        let (manager, _dir) = setup();
        let (id, _) = manager.connect(None);
        let before = manager.working_directory(id).unwrap();

        for _ in 0..3 {
            assert_eq!(manager.move_up(id).unwrap(), MoveUpOutcome::AtRoot);
        }
        assert_eq!(manager.working_directory(id).unwrap(), before);
        assert!(manager.events().is_empty(), "failed up must not be logged");
    }

    #[tokio::test]
    async fn test_cd_and_up() {
        let (manager, dir) = setup();
        std::fs::create_dir_all(dir.path().join("root/docs/notes")).unwrap();
        std::fs::write(dir.path().join("root/docs/f.txt"), "x").unwrap();
        let (id, _) = manager.connect(None);

        assert_eq!(manager.change_directory(id, "nope").await.unwrap(), ChangeDirOutcome::NoSuchDirectory);
        assert_eq!(manager.change_directory(id, "docs").await.unwrap(), ChangeDirOutcome::Changed);
        assert_eq!(manager.change_directory(id, "f.txt").await.unwrap(), ChangeDirOutcome::NoSuchDirectory);
        assert_eq!(manager.change_directory(id, "notes").await.unwrap(), ChangeDirOutcome::Changed);
        assert_eq!(manager.working_directory(id).unwrap(), "root/docs/notes/");

        assert_eq!(manager.move_up(id).unwrap(), MoveUpOutcome::Changed);
        assert_eq!(manager.working_directory(id).unwrap(), "root/docs/");
        assert_eq!(descriptions(&manager), ["cd docs", "cd notes", "up"]);
    }

    #[tokio::test]
    async fn test_cd_dot_does_not_grow_stack() {
        let (manager, _dir) = setup();
        let (id, _) = manager.connect(None);
        assert_eq!(manager.change_directory(id, ".").await.unwrap(), ChangeDirOutcome::Changed);
        assert_eq!(manager.working_directory(id).unwrap(), "root/");
        assert_eq!(manager.move_up(id).unwrap(), MoveUpOutcome::AtRoot);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (manager, dir) = setup();
        std::fs::create_dir(dir.path().join("root/docs")).unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        manager.change_directory(a, "docs").await.unwrap();
        assert_eq!(manager.resolve(a, "x").unwrap(), "root/docs/x");
        assert_eq!(manager.resolve(b, "x").unwrap(), "root/x");

        manager.write(a, "x", "from a").await.unwrap();
        assert_eq!(manager.read(b, "x").await.unwrap(), ReadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_list_classification() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/x"), "").unwrap();
        std::fs::create_dir(dir.path().join("root/y")).unwrap();
        std::fs::write(dir.path().join("root/y/inner"), "").unwrap();
        let (id, _) = manager.connect(None);

        let ListOutcome::Listing(mut entries) = manager.list(id, "").await.unwrap() else {
            panic!("expected a listing");
        };
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let rows: Vec<_> = entries.iter().map(|e| format!("{} {}", e.tag(), e.name)).collect();
        assert_eq!(rows, ["f x", "d y"]);

        assert_eq!(
            manager.list(id, "y").await.unwrap(),
            ListOutcome::Listing(vec![crate::types::ListEntry::file("inner")])
        );
        assert_eq!(manager.list(id, "x").await.unwrap(), ListOutcome::NotAListing);
        assert_eq!(manager.list(id, "z").await.unwrap(), ListOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_read_guards() {
        let (manager, dir) = setup();
        std::fs::create_dir(dir.path().join("root/sub")).unwrap();
        let (id, _) = manager.connect(None);

        assert_eq!(manager.read(id, "missing").await.unwrap(), ReadOutcome::NotFound);
        assert_eq!(manager.read(id, "sub").await.unwrap(), ReadOutcome::IsADirectory);
        assert!(manager.events().is_empty());
    }

    #[tokio::test]
    async fn test_make_directory() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f"), "").unwrap();
        std::fs::create_dir(dir.path().join("root/d")).unwrap();
        let (id, _) = manager.connect(None);

        assert_eq!(manager.make_directory(id, "f").await.unwrap(), MkdirOutcome::FileExists);
        assert_eq!(manager.make_directory(id, "d").await.unwrap(), MkdirOutcome::DirExists);
        assert_eq!(manager.make_directory(id, "new/deep").await.unwrap(), MkdirOutcome::Created);
        assert_eq!(manager.item_kind(id, "new/deep").await.unwrap(), ItemKind::Directory);
        assert_eq!(descriptions(&manager), ["mkdir root/new/deep"]);
    }

    #[tokio::test]
    async fn test_remove_directory_with_locked_contents() {
        let (manager, dir) = setup();
        std::fs::create_dir(dir.path().join("root/d")).unwrap();
        std::fs::write(dir.path().join("root/d/f.txt"), "x").unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        manager.change_directory(a, "d").await.unwrap();
        assert_eq!(manager.lock(a, "f.txt").await.unwrap(), LockOutcome::Locked);

        assert_eq!(manager.remove_directory(b, "d").await.unwrap(), RmdirOutcome::HasLockedContents);
        assert!(dir.path().join("root/d/f.txt").exists());

        manager.release_lock(a, "f.txt").unwrap();
        assert_eq!(manager.remove_directory(b, "d").await.unwrap(), RmdirOutcome::Removed);
        assert!(!dir.path().join("root/d").exists());
    }

    #[tokio::test]
    async fn test_remove_directory_component_membership() {
        let (manager, dir) = setup();
        std::fs::create_dir(dir.path().join("root/a")).unwrap();
        std::fs::create_dir(dir.path().join("root/ab")).unwrap();
        std::fs::write(dir.path().join("root/ab/f"), "x").unwrap();
        let (id, _) = manager.connect(None);

        manager.lock(id, "ab/f").await.unwrap();
        assert_eq!(manager.remove_directory(id, "a").await.unwrap(), RmdirOutcome::Removed);
    }

    #[tokio::test]
    async fn test_remove_directory_guards() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f"), "").unwrap();
        let (id, _) = manager.connect(None);

        assert_eq!(manager.remove_directory(id, "missing").await.unwrap(), RmdirOutcome::NotFound);
        assert_eq!(manager.remove_directory(id, "f").await.unwrap(), RmdirOutcome::IsAFile);
        assert_eq!(manager.remove_directory(id, "").await.unwrap(), RmdirOutcome::NotFound);
        assert!(dir.path().join("root").is_dir());
    }

    #[tokio::test]
    async fn test_remove_directory_refuses_working_directory_aliases() {
        let (manager, dir) = setup_with(|c| c.confine_to_root = true);
        std::fs::create_dir_all(dir.path().join("root/d/sub")).unwrap();
        std::fs::write(dir.path().join("root/keep.txt"), "keep").unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);
        assert_eq!(manager.lock(b, "keep.txt").await.unwrap(), LockOutcome::Locked);

        for name in ["d/..", "././", ".", "./", "d/sub/../.."] {
            assert_eq!(
                manager.remove_directory(a, name).await.unwrap(),
                RmdirOutcome::NotFound,
                "rmdir {name:?}"
            );
        }
        assert!(dir.path().join("root/keep.txt").exists());

        manager.change_directory(a, "d").await.unwrap();
        assert_eq!(manager.remove_directory(a, "..").await.unwrap(), RmdirOutcome::NotFound);
        assert_eq!(manager.remove_directory(a, "../d").await.unwrap(), RmdirOutcome::NotFound);
        assert_eq!(manager.remove_directory(a, "./sub").await.unwrap(), RmdirOutcome::Removed);
        assert!(dir.path().join("root/d").is_dir());
        assert!(manager.events().iter().all(|e| e.description != "rmdir root/d/.."));
    }

    #[tokio::test]
    async fn test_remove_directory_sees_lock_taken_through_alias() {
        let (manager, dir) = setup();
        std::fs::create_dir(dir.path().join("root/d")).unwrap();
        std::fs::write(dir.path().join("root/d/f.txt"), "x").unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        assert_eq!(manager.lock(a, "./d/f.txt").await.unwrap(), LockOutcome::Locked);
        assert_eq!(manager.remove_directory(b, "d").await.unwrap(), RmdirOutcome::HasLockedContents);
        assert_eq!(manager.remove_directory(b, "./d").await.unwrap(), RmdirOutcome::HasLockedContents);
        assert!(dir.path().join("root/d/f.txt").exists());
    }

    #[tokio::test]
    async fn test_lock_covers_every_spelling_of_a_path() {
        let (manager, dir) = setup();
        std::fs::create_dir(dir.path().join("root/d")).unwrap();
        std::fs::write(dir.path().join("root/f.txt"), "original").unwrap();
        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);

        assert_eq!(manager.lock(a, "f.txt").await.unwrap(), LockOutcome::Locked);
        assert_eq!(manager.write(b, "./f.txt", "clobber").await.unwrap(), WriteOutcome::Locked);
        assert_eq!(manager.write(b, "d/../f.txt", "clobber").await.unwrap(), WriteOutcome::Locked);
        assert_eq!(manager.delete(b, "./f.txt").await.unwrap(), DeleteOutcome::Locked);
        assert_eq!(manager.lock(b, "./f.txt").await.unwrap(), LockOutcome::AlreadyLocked);
        assert_eq!(std::fs::read_to_string(dir.path().join("root/f.txt")).unwrap(), "original");
        assert_eq!(manager.lock_records().len(), 1);
        assert!(manager.is_locked("root/./f.txt"));

        assert_eq!(manager.release_lock(a, "./f.txt").unwrap(), ReleaseOutcome::Released);
        assert!(manager.lock_records().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_confined_refuses_symlink_out_of_root() {
        use std::os::unix::fs::symlink;

        let (manager, dir) = setup_with(|c| c.confine_to_root = true);
        std::fs::create_dir(dir.path().join("outside")).unwrap();
        std::fs::write(dir.path().join("outside/secret"), "top secret").unwrap();
        std::fs::create_dir(dir.path().join("root/d")).unwrap();
        std::fs::write(dir.path().join("root/d/f.txt"), "inside").unwrap();
        symlink(dir.path().join("outside"), dir.path().join("root/link")).unwrap();
        symlink(dir.path().join("outside/new.txt"), dir.path().join("root/dangling")).unwrap();
        symlink(dir.path().join("root/d"), dir.path().join("root/inner")).unwrap();
        let (id, _) = manager.connect(None);

        let err = manager.read(id, "link/secret").await.unwrap_err();
        assert!(matches!(err, FsError::PathEscapesRoot(_)));
        assert!(manager.write(id, "link/planted.txt", "x").await.is_err());
        assert!(manager.write(id, "dangling", "x").await.is_err());
        assert!(manager.change_directory(id, "link").await.is_err());
        assert!(!dir.path().join("outside/planted.txt").exists());
        assert!(!dir.path().join("outside/new.txt").exists());

        match manager.read(id, "inner/f.txt").await.unwrap() {
            ReadOutcome::Content { contents, .. } => assert_eq!(contents, "inside"),
            other => panic!("unexpected read outcome: {other:?}"),
        }
        assert_eq!(manager.write(id, "d/new.txt", "ok").await.unwrap(), WriteOutcome::Written);
    }

    #[tokio::test]
    async fn test_disconnect_keeps_locks_until_sweep() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();
        let (a, token) = manager.connect(None);

        manager.lock(a, "f.txt").await.unwrap();
        manager.disconnect(a);
        assert!(token.is_cancelled());
        assert!(!manager.session_exists(a));
        assert!(manager.is_locked("root/f.txt"));

        assert_eq!(manager.sweep_locks(), 1);
        assert!(!manager.is_locked("root/f.txt"));
        assert_eq!(
            descriptions(&manager),
            ["lock root/f.txt", "disconnect client 0", "lock auto-release"]
        );
    }

    #[tokio::test]
    async fn test_release_on_disconnect() {
        let (manager, dir) = setup_with(|c| c.release_on_disconnect = true);
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();
        let (a, _) = manager.connect(None);

        manager.lock(a, "f.txt").await.unwrap();
        manager.disconnect(a);
        assert!(!manager.is_locked("root/f.txt"));
    }

    #[tokio::test]
    async fn test_disconnect_unknown_is_noop() {
        let (manager, _dir) = setup();
        manager.disconnect(SessionId::new(99));
        assert!(manager.events().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (manager, _dir) = setup();
        let err = manager.read(SessionId::new(5), "x").await.unwrap_err();
        assert!(matches!(err, FsError::UnknownSession(id) if id.get() == 5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_after_interval() {
        let (manager, dir) = setup_with(|c| c.sweep_interval = Duration::from_secs(60));
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();
        let _sweeper = manager.spawn_sweeper();

        let (a, _) = manager.connect(None);
        let (b, _) = manager.connect(None);
        manager.lock(a, "f.txt").await.unwrap();
        manager.disconnect(a);
        assert!(manager.is_locked("root/f.txt"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!manager.is_locked("root/f.txt"));
        assert_eq!(manager.lock(b, "f.txt").await.unwrap(), LockOutcome::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_live_locks() {
        let (manager, dir) = setup_with(|c| c.sweep_interval = Duration::from_secs(1));
        std::fs::write(dir.path().join("root/f.txt"), "x").unwrap();
        let _sweeper = manager.spawn_sweeper();

        let (a, _) = manager.connect(None);
        manager.lock(a, "f.txt").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(manager.is_locked("root/f.txt"));
    }

    #[tokio::test]
    async fn test_sweeper_stops_with_manager() {
        let (manager, _dir) = setup_with(|c| c.sweep_interval = Duration::from_millis(10));
        let sweeper = manager.spawn_sweeper();
        drop(manager);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sweeper.is_finished());
    }

    #[tokio::test]
    async fn test_confined_rejects_escape() {
        let (manager, _dir) = setup_with(|c| c.confine_to_root = true);
        let (id, _) = manager.connect(None);

        let err = manager.read(id, "../secret").await.unwrap_err();
        assert!(matches!(err, FsError::PathEscapesRoot(_)));
        assert!(err.is_recoverable());
        assert!(manager.make_directory(id, "/abs").await.is_err());
        assert_eq!(manager.make_directory(id, "ok/../fine").await.unwrap(), MkdirOutcome::Created);
    }

    #[tokio::test]
    async fn test_unconfined_allows_escape() {
        let (manager, dir) = setup();
        std::fs::write(dir.path().join("outside.txt"), "outside").unwrap();
        let (id, _) = manager.connect(None);

        match manager.read(id, "../outside.txt").await.unwrap() {
            ReadOutcome::Content { contents, .. } => assert_eq!(contents, "outside"),
            other => panic!("unexpected read outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_root() {
        let dir = TempDir::new().unwrap();
        let manager = FileSystemManager::new(ManagerConfig::new(dir.path(), "fresh"));
        manager.ensure_root().await.unwrap();
        assert!(dir.path().join("fresh").is_dir());
    }
}
