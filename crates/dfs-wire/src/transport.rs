//! Message framing over a byte stream.
//!
//! Two framings are supported:
//!
//! - `raw`: one socket read is one message, capped at the receive buffer
//!   size. A trailing `\n` or `\r\n` is stripped so line-oriented tools
//!   like `nc` work, unless the stream was built with
//!   [`MessageStream::keep_line_endings`]. Writes are unframed.
//! - `length-prefixed`: every message in both directions is a big-endian
//!   `u32` byte count followed by that many bytes of UTF-8.

use std::io;
use std::string::FromUtf8Error;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_RECV_BUFFER_SIZE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    #[default]
    Raw,
    LengthPrefixed,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
}

/// Size limits applied by a [`MessageStream`].
///
/// Servers and clients use different receive buffers in raw framing: a
/// server reads short requests, a client reads whole listings and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub recv_buffer_size: usize,
    pub max_message_size: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// A framed, text-message view of a stream.
pub struct MessageStream<S = TcpStream> {
    stream: S,
    framing: Framing,
    limits: FrameLimits,
    strip_line_endings: bool,
    buf: Vec<u8>,
}

impl<S> MessageStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, framing: Framing, limits: FrameLimits) -> Self {
        Self {
            stream,
            framing,
            limits,
            strip_line_endings: true,
            buf: Vec::new(),
        }
    }

    /// Deliver raw reads byte for byte. Clients use this so file contents
    /// ending in a newline survive.
    pub fn keep_line_endings(mut self) -> Self {
        self.strip_line_endings = false;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Receive the next message. `None` means the peer closed the stream.
    pub async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.framing {
            Framing::Raw => self.recv_raw().await,
            Framing::LengthPrefixed => self.recv_prefixed().await,
        }
    }

    pub async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        match self.framing {
            Framing::Raw => self.stream.write_all(text.as_bytes()).await?,
            Framing::LengthPrefixed => {
                let len = text.len();
                if len > self.limits.max_message_size {
                    return Err(TransportError::TooLarge {
                        len,
                        max: self.limits.max_message_size,
                    });
                }
                let len = u32::try_from(len).map_err(|_| TransportError::TooLarge {
                    len,
                    max: u32::MAX as usize,
                })?;
                self.stream.write_u32(len).await?;
                self.stream.write_all(text.as_bytes()).await?;
            }
        }
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv_raw(&mut self) -> Result<Option<String>, TransportError> {
        self.buf.resize(self.limits.recv_buffer_size.max(1), 0);
        let n = self.stream.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }

        // A read may split a multi-byte character at the buffer edge.
        let text = String::from_utf8_lossy(&self.buf[..n]);
        if self.strip_line_endings {
            Ok(Some(strip_line_ending(&text).to_string()))
        } else {
            Ok(Some(text.into_owned()))
        }
    }

    async fn recv_prefixed(&mut self) -> Result<Option<String>, TransportError> {
        let len = match self.stream.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if len > self.limits.max_message_size {
            return Err(TransportError::TooLarge {
                len,
                max: self.limits.max_message_size,
            });
        }

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        Ok(Some(String::from_utf8(payload)?))
    }
}

fn strip_line_ending(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}
