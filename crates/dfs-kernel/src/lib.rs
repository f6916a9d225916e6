//! # dfs-kernel
//!
//! The shared file system manager behind the dfs server.
//!
//! Every connected client gets a session with its own directory stack rooted
//! at a configured segment. Sessions share one real directory tree, one
//! table of advisory path locks and one audit log. A periodic sweep drops
//! locks whose owning session is gone.
//!
//! The crate knows nothing about sockets or wire formats; operations answer
//! with small outcome enums that the server maps onto response text.

pub mod disk;
pub mod error;
pub mod events;
pub mod locks;
pub mod manager;
pub mod resolve;
pub mod session;
pub mod types;

pub use disk::Disk;
pub use error::{FsError, FsResult};
pub use events::{Event, EventLog};
pub use locks::{LockRecord, LockTable};
pub use manager::{
    DEFAULT_ROOT, DEFAULT_SWEEP_INTERVAL, FileSystemManager, ManagerConfig, SweeperHandle,
};
pub use session::{Session, SessionTable};
pub use types::{
    ChangeDirOutcome, DeleteOutcome, ItemKind, ListEntry, ListOutcome, LockOutcome, MkdirOutcome,
    MoveUpOutcome, ReadOutcome, ReleaseOutcome, RmdirOutcome, SessionId, WriteOutcome,
};
