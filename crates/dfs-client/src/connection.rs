//! A framed TCP connection to a dfs server.

use std::io;

use dfs_wire::{FrameLimits, MessageStream, TransportError};
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::constants::{CONNECT_TIMEOUT, MAX_MESSAGE_SIZE, RAW_RECV_BUFFER_SIZE};

pub use dfs_wire::Framing;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("server closed the connection")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cannot read local file {path}: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Usage(String),
}

impl ClientError {
    /// Whether the connection is still usable after this error.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalFile { .. } | Self::Usage(_))
    }
}

/// Receive limits for the client side. Listings and file contents come
/// back in one raw read, so the buffer is larger than the server's.
fn client_limits() -> FrameLimits {
    FrameLimits {
        recv_buffer_size: RAW_RECV_BUFFER_SIZE,
        max_message_size: MAX_MESSAGE_SIZE,
    }
}

pub struct Connection {
    stream: MessageStream<TcpStream>,
}

impl Connection {
    pub async fn connect(addr: impl ToSocketAddrs + std::fmt::Display, framing: Framing) -> Result<Self, ClientError> {
        let label = addr.to_string();
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ClientError::Connect { addr: label, source }),
            Err(_) => return Err(ClientError::ConnectTimeout(label)),
        };
        stream.set_nodelay(true)?;
        tracing::debug!(addr = %label, ?framing, "connected");

        Ok(Self {
            stream: MessageStream::new(stream, framing, client_limits()).keep_line_endings(),
        })
    }

    pub fn framing(&self) -> Framing {
        self.stream.framing()
    }

    /// Send one message and wait for its response.
    pub async fn request(&mut self, message: &str) -> Result<String, ClientError> {
        self.send(message).await?;
        self.recv().await
    }

    pub async fn send(&mut self, message: &str) -> Result<(), ClientError> {
        self.stream.send(message).await?;
        Ok(())
    }

    /// Next response. A closed stream is [`ClientError::Closed`].
    pub async fn recv(&mut self) -> Result<String, ClientError> {
        self.stream.recv().await?.ok_or(ClientError::Closed)
    }
}
