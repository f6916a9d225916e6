//! Interactive client: turns shell-style lines into protocol requests.
//!
//! Lines are space-separated words, joined with `////` on the wire:
//! `cd docs` becomes `cd////docs`. `write <file>` is special: it uploads
//! the contents of the local `<file>` under the same name.
//!
//! `read` responses are cached by resolved path (working directory plus
//! name), so repeated reads of an unchanged file skip the server.

use tokio::net::ToSocketAddrs;

use dfs_wire::DELIMITER;

use crate::cache::ResponseCache;
use crate::connection::{ClientError, Connection, Framing};

const WRITE_OK: &str = "write process is successful";

/// Text printed for a line, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Server(String),
    Cached(String),
}

impl Response {
    pub fn text(&self) -> &str {
        match self {
            Response::Server(text) | Response::Cached(text) => text,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Response::Cached(_))
    }
}

pub struct Client {
    conn: Connection,
    cache: ResponseCache,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs + std::fmt::Display, framing: Framing) -> Result<Self, ClientError> {
        Ok(Self::new(Connection::connect(addr, framing).await?))
    }

    pub fn new(conn: Connection) -> Self {
        Self::with_cache(conn, ResponseCache::default())
    }

    pub fn with_cache(conn: Connection, cache: ResponseCache) -> Self {
        Self { conn, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Send a raw protocol message, bypassing line translation and cache.
    pub async fn request(&mut self, message: &str) -> Result<String, ClientError> {
        self.conn.request(message).await
    }

    /// Run one interactive line.
    pub async fn send_line(&mut self, line: &str) -> Result<Response, ClientError> {
        let message = translate(line).await?;
        let (verb, rest) = message.split_once(DELIMITER).unwrap_or((message.as_str(), ""));

        match verb {
            "read" if !rest.is_empty() && !rest.contains(DELIMITER) => self.read(rest).await,
            "write" | "delete" => {
                let name = rest.split_once(DELIMITER).map_or(rest, |(name, _)| name).to_string();
                let reply = self.conn.request(&message).await?;
                if reply == WRITE_OK || reply.starts_with("deleted ") {
                    let path = self.resolve(&name).await?;
                    if self.cache.invalidate(&path) {
                        tracing::debug!(path = %path, "invalidated cached read");
                    }
                }
                Ok(Response::Server(reply))
            }
            _ => Ok(Response::Server(self.conn.request(&message).await?)),
        }
    }

    async fn read(&mut self, name: &str) -> Result<Response, ClientError> {
        self.cache.purge_expired();
        let path = self.resolve(name).await?;
        if let Some(contents) = self.cache.get(&path) {
            tracing::debug!(path = %path, "cache hit");
            return Ok(Response::Cached(contents.to_string()));
        }

        let reply = self.conn.request(&format!("read{DELIMITER}{name}")).await?;
        match reply.split_once(DELIMITER) {
            Some((served, contents)) => {
                self.cache.insert(served, contents);
                Ok(Response::Server(contents.to_string()))
            }
            None => Ok(Response::Server(reply)),
        }
    }

    /// Resolved server path of `name`, from the server's working directory.
    async fn resolve(&mut self, name: &str) -> Result<String, ClientError> {
        let cwd = self.conn.request("pwd").await?;
        Ok(format!("{cwd}{name}"))
    }
}

/// Translate an interactive line into a protocol message.
pub async fn translate(line: &str) -> Result<String, ClientError> {
    let words: Vec<&str> = line.trim().split(' ').collect();

    if words.first() == Some(&"write") {
        let [_, file] = words.as_slice() else {
            return Err(ClientError::Usage("usage: write <local-file>".to_string()));
        };
        let contents = tokio::fs::read_to_string(file)
            .await
            .map_err(|source| ClientError::LocalFile {
                path: file.to_string(),
                source,
            })?;
        return Ok(format!("write{DELIMITER}{file}{DELIMITER}{contents}"));
    }

    Ok(words.join(DELIMITER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_translate_plain() {
        assert_eq!(translate("ls").await.unwrap(), "ls");
        assert_eq!(translate("cd docs\n").await.unwrap(), "cd////docs");
        assert_eq!(translate("read a.txt").await.unwrap(), "read////a.txt");
        assert_eq!(translate("KILL_SERVICE").await.unwrap(), "KILL_SERVICE");
    }

    #[tokio::test]
    async fn test_translate_write_uploads_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "line one\nline two").unwrap();
        let line = format!("write {}", file.display());

        let message = translate(&line).await.unwrap();
        assert_eq!(message, format!("write////{}////line one\nline two", file.display()));
    }

    #[tokio::test]
    async fn test_translate_write_errors() {
        assert!(matches!(translate("write").await, Err(ClientError::Usage(_))));
        assert!(matches!(translate("write a b").await, Err(ClientError::Usage(_))));

        let err = translate("write /definitely/not/here.txt").await.unwrap_err();
        assert!(matches!(err, ClientError::LocalFile { .. }));
        assert!(err.is_local());
    }

    #[test]
    fn test_response_text() {
        assert_eq!(Response::Cached("x".into()).text(), "x");
        assert!(Response::Cached("x".into()).is_cached());
        assert!(!Response::Server("x".into()).is_cached());
    }
}
