//! # dfs-wire
//!
//! What the dfs server and client must agree on byte for byte: the `////`
//! field delimiter and the two message framings.
//!
//! A leaf crate with no internal dfs dependencies.

pub mod transport;

pub use transport::{FrameLimits, Framing, MessageStream, TransportError};

/// Field separator inside a message.
pub const DELIMITER: &str = "////";

/// Bytes taken by one socket read in raw framing. Longer messages are not
/// reassembled.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1024;

/// Largest payload accepted or sent in length-prefixed framing.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;
