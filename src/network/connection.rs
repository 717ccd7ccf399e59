//! Connection Handler
//!
//! Handles individual client connections.

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinSet;

use crate::engine::Database;
use crate::error::{OptiError, Result};
use crate::lifecycle::ShutdownBarrier;
use crate::protocol::{read_frame, Request, Response};

use super::{SendSerializer, MAX_IN_FLIGHT};

/// Handles a single client connection
pub struct Connection {
    /// Read half (buffered for efficiency)
    reader: BufReader<OwnedReadHalf>,

    /// Write half shared by the request tasks
    sender: Arc<SendSerializer<OwnedWriteHalf>>,

    db: Arc<Database>,

    barrier: ShutdownBarrier,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    pub fn new(stream: TcpStream, db: Arc<Database>, barrier: ShutdownBarrier) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            sender: Arc::new(SendSerializer::new(write_half)),
            db,
            barrier,
            peer_addr,
        })
    }

    /// Serve requests until the client disconnects or sends garbage
    ///
    /// Requests still running when the read side ends are awaited before
    /// returning, so their replies are not lost.
    pub async fn handle(mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);
        let mut in_flight = JoinSet::new();

        let outcome = loop {
            let request: Request = match read_frame(&mut self.reader).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    break Ok(());
                }
                Err(OptiError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Connection with {} lost: {}", self.peer_addr, e);
                    break Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = self.sender.send(&Response::error(String::new(), &e)).await;
                    break Err(e);
                }
            };

            tracing::trace!("Received request {} from {}", request.id, self.peer_addr);

            let db = Arc::clone(&self.db);
            let barrier = self.barrier.clone();
            let sender = Arc::clone(&self.sender);
            let peer_addr = self.peer_addr.clone();
            in_flight.spawn(async move {
                let response = process(&db, &barrier, request).await;
                if let Err(e) = sender.send(&response).await {
                    tracing::debug!("Failed to reply to {}: {}", peer_addr, e);
                }
            });

            // Reap finished tasks so the set does not grow with the session
            while in_flight.try_join_next().is_some() {}
            while in_flight.len() >= MAX_IN_FLIGHT {
                in_flight.join_next().await;
            }
        };

        while in_flight.join_next().await.is_some() {}
        outcome
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Run one request behind a barrier permit
async fn process(db: &Database, barrier: &ShutdownBarrier, request: Request) -> Response {
    let id = request.id.clone();
    let txn = request.into_transaction();

    let permit = match barrier.enter().await {
        Ok(permit) => permit,
        Err(e) => return Response::error(id, &e),
    };
    let result = db.execute(&permit, &txn).await;
    drop(permit);

    match result {
        Ok(outcome) => Response::from_outcome(id, &outcome),
        Err(e) => {
            tracing::debug!("Transaction {} failed: {}", id, e);
            Response::error(id, &e)
        }
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
