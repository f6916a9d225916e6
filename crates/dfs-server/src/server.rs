//! TCP accept loop and per-connection workers.

use std::future::{self, Future};
use std::net::SocketAddr;
use std::sync::Arc;

use dfs_kernel::{FileSystemManager, FsError, SessionId};
use dfs_wire::{FrameLimits, Framing, MessageStream};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ConfigError, ServerConfig};
use crate::protocol::{self, Action, Reply, Request};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare root directory: {0}")]
    Root(#[source] FsError),
}

/// Why [`FileServer::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    /// A client sent `KILL_SERVICE`.
    Killed,
    /// The caller's stop future completed.
    Stopped,
}

pub struct FileServer {
    config: ServerConfig,
    listener: TcpListener,
    manager: Arc<FileSystemManager>,
}

impl FileServer {
    /// Validate the config, create the root directory if missing, and bind
    /// the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let manager = Arc::new(FileSystemManager::new(config.manager_config()));
        manager.ensure_root().await.map_err(ServerError::Root)?;

        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            config,
            listener,
            manager,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn manager(&self) -> Arc<FileSystemManager> {
        Arc::clone(&self.manager)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve until a client sends `KILL_SERVICE`.
    pub async fn run(self) -> ServerExit {
        self.run_until(future::pending()).await
    }

    /// Serve until `KILL_SERVICE` or until `stop` completes.
    pub async fn run_until(self, stop: impl Future<Output = ()>) -> ServerExit {
        let _sweeper = self.manager.spawn_sweeper();
        let (kill_tx, mut kill_rx) = mpsc::channel::<SessionId>(1);
        let settings = ConnectionSettings {
            framing: self.config.framing,
            limits: self.config.frame_limits(),
        };

        if let Ok(addr) = self.local_addr() {
            tracing::info!(%addr, framing = ?settings.framing, root = %self.config.root, "file server listening");
        }

        tokio::pin!(stop);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let manager = Arc::clone(&self.manager);
                        let kill_tx = kill_tx.clone();
                        tokio::spawn(handle_connection(manager, stream, peer, settings, kill_tx));
                    }
                    Err(e) => tracing::warn!("accept failed: {e}"),
                },
                Some(id) = kill_rx.recv() => {
                    tracing::info!(session = %id, "KILL_SERVICE received, shutting down");
                    return ServerExit::Killed;
                }
                _ = &mut stop => {
                    tracing::info!("file server stopping");
                    return ServerExit::Stopped;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    framing: Framing,
    limits: FrameLimits,
}

async fn handle_connection(
    manager: Arc<FileSystemManager>,
    stream: TcpStream,
    peer: SocketAddr,
    settings: ConnectionSettings,
    kill_tx: mpsc::Sender<SessionId>,
) {
    let (id, hangup) = manager.connect(Some(peer));
    let span = tracing::info_span!("session", session = %id, %peer);

    async move {
        let mut stream = MessageStream::new(stream, settings.framing, settings.limits);
        let action = serve(&manager, id, &hangup, &mut stream).await;
        manager.disconnect(id);

        if action == Action::Shutdown {
            let _ = kill_tx.send(id).await;
        }
    }
    .instrument(span)
    .await
}

/// Request loop for one session. Returns the action that ended it.
async fn serve(
    manager: &FileSystemManager,
    id: SessionId,
    hangup: &CancellationToken,
    stream: &mut MessageStream,
) -> Action {
    loop {
        let received = tokio::select! {
            _ = hangup.cancelled() => {
                tracing::debug!("session hung up");
                return Action::Disconnect;
            }
            received = stream.recv() => received,
        };

        let message = match received {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!("client closed connection");
                return Action::Disconnect;
            }
            Err(e) => {
                tracing::warn!("receive failed: {e}");
                let _ = stream.send(protocol::SERVER_ERROR).await;
                return Action::Disconnect;
            }
        };

        let reply = match Request::parse(&message) {
            Ok(request) => {
                tracing::debug!(?request, "request");
                match protocol::respond(manager, id, request).await {
                    Ok(reply) => reply,
                    Err(e) if e.is_recoverable() => Reply::text(e.to_string()),
                    Err(e) => {
                        tracing::error!("request failed: {e}");
                        let _ = stream.send(protocol::SERVER_ERROR).await;
                        return Action::Disconnect;
                    }
                }
            }
            Err(e) => {
                tracing::debug!("rejected message: {e}");
                Reply::text(protocol::UNRECOGNISED_COMMAND)
            }
        };

        if let Err(e) = stream.send(&reply.text).await {
            tracing::warn!("send failed: {e}");
            return Action::Disconnect;
        }
        if reply.action != Action::Continue {
            return reply.action;
        }
    }
}
