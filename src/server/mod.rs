//! Connection dispatch: binds the listening socket and hands every accepted
//! connection to its own task.

pub mod listener;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::http::connection::Handler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Accepting connections
    Open,
    /// Accept loop stopped
    Closed,
}

/// A running server. Dropping it stops the accept loop.
pub struct Server {
    local_addr: SocketAddr,
    state: ServerState,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Binds `cfg.listen_addr` and starts accepting connections in the
    /// background.
    pub async fn serve<H: Handler>(cfg: &ServerConfig, handler: H) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&cfg.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", cfg.listen_addr))?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let handler = Arc::new(handler);
        let read_timeout = cfg.read_timeout();
        let write_timeout = cfg.write_timeout();
        let accept_task = tokio::spawn(async move {
            if let Err(e) = listener::run(listener, handler, read_timeout, write_timeout).await {
                tracing::error!("Accept loop stopped: {}", e);
            }
        });

        Ok(Self {
            local_addr,
            state: ServerState::Open,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Stops accepting connections. Connections already accepted run to
    /// completion.
    pub fn close(&mut self) -> anyhow::Result<()> {
        if self.state == ServerState::Closed {
            anyhow::bail!("server on {} is already closed", self.local_addr);
        }

        self.accept_task.abort();
        self.state = ServerState::Closed;
        info!("Closed server on {}", self.local_addr);
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
