//! TCP accept loop and per-connection task spawning.

mod config;
mod connection;
mod session;

pub use config::{Security, ServerConfig, ServerConfigBuilder};
pub use connection::Connection;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tracing::info;

use crate::Result;
use crate::handler::ImapHandler;
use session::Session;

/// The accept loop.
///
/// Owns the handler and hands each accepted socket to a fresh
/// [`Session`] on its own task, so one connection can never stall
/// another. Connection ids are process-unique and monotonically
/// increasing.
pub struct ImapServer<H: ImapHandler> {
    handler: Arc<H>,
    config: ServerConfig,
    next_id: AtomicU64,
}

impl<H: ImapHandler> ImapServer<H> {
    /// Creates a server around a handler.
    pub fn new(handler: H, config: ServerConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Binds the configured address and returns the listener.
    ///
    /// Split from [`serve`](Self::serve) so callers can bind port 0 and
    /// discover the assigned port before accepting.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener =
            TcpListener::bind((self.config.addr.as_str(), self.config.port)).await?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(listener)
    }

    /// Binds and serves until the process is torn down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accepts connections from an already bound listener forever.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let conn = Connection::new(id, peer);
            let session = Session::new(stream, conn, Arc::clone(&self.handler));
            tokio::spawn(session.run());
        }
    }
}
