//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 1024;

/// Timeout for establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bytes taken by one socket read in raw framing. Larger than the server's
/// receive buffer because listings and file contents come back in one read.
pub const RAW_RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Largest payload accepted in length-prefixed framing.
pub const MAX_MESSAGE_SIZE: usize = dfs_wire::DEFAULT_MAX_MESSAGE_SIZE;

/// Number of read responses kept by the cache.
pub const CACHE_CAPACITY: usize = 5;

/// How long a cached read stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(20);
