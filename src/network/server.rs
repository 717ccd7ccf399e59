//! TCP Server
//!
//! Accepts connections and spawns a task for each one.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::engine::Database;
use crate::error::Result;
use crate::lifecycle::{ShutdownBarrier, ShutdownHook};

use super::Connection;

/// TCP server for OptiKV
pub struct Server {
    listener: TcpListener,
    db: Arc<Database>,
    barrier: ShutdownBarrier,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

/// Stops a running [`Server`] from accepting connections
#[derive(Clone)]
pub struct ServerHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl Server {
    /// Bind the listener; connections are accepted once `run` is awaited
    pub async fn bind(addr: &str, db: Arc<Database>, barrier: ShutdownBarrier) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (stop_tx, stop_rx) = watch::channel(false);

        Ok(Self {
            listener,
            db,
            barrier,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            stop_tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Accept connections until stopped
    ///
    /// Open connections keep running; the shutdown barrier turns their later
    /// requests away.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("OptiKV listening on {}", self.local_addr()?);

        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    tracing::debug!("New connection from {}", addr);
                    self.spawn_connection(stream);
                }
                _ = self.stop_rx.changed() => {}
            }
        }

        tracing::info!("Stopped accepting connections");
        Ok(())
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream) {
        let connection = match Connection::new(stream, Arc::clone(&self.db), self.barrier.clone())
        {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Failed to set up connection: {}", e);
                return;
            }
        };

        tokio::spawn(async move {
            let peer_addr = connection.peer_addr().to_string();
            if let Err(e) = connection.handle().await {
                tracing::warn!("Connection {} closed with error: {}", peer_addr, e);
            }
        });
    }
}

impl ServerHandle {
    pub fn stop(&self) {
        // No receiver means the server already returned
        let _ = self.stop_tx.send(true);
    }
}

#[async_trait]
impl ShutdownHook for ServerHandle {
    fn name(&self) -> &str {
        "server"
    }

    async fn shutdown(&self) -> Result<()> {
        self.stop();
        Ok(())
    }
}
