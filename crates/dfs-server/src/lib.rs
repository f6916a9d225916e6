//! # dfs-server
//!
//! TCP front end for the dfs file system manager.
//!
//! Each accepted connection becomes a session. Messages are `////`-delimited
//! text requests (see [`protocol`]) carried in one of the two framings
//! defined by `dfs-wire`.

pub mod config;
pub mod constants;
pub mod protocol;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use protocol::{Action, ProtocolError, Reply, Request, Verb};
pub use server::{FileServer, ServerError, ServerExit};
pub use dfs_wire::{FrameLimits, Framing, MessageStream, TransportError};
