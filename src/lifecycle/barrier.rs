//! Shutdown barrier
//!
//! Reader permits for in-flight transactions, a writer permit for shutdown.
//! tokio's `RwLock` is fair: once the writer is queued, later readers wait
//! behind it, so shutdown cannot be starved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

use crate::error::{OptiError, Result};

use super::ShutdownHook;

/// Gate every transaction passes through
#[derive(Debug, Clone, Default)]
pub struct ShutdownBarrier {
    lock: Arc<RwLock<()>>,
    stopped: Arc<AtomicBool>,
}

/// Proof that the holder was admitted before shutdown began
///
/// Shutdown cannot finish draining while a permit is alive.
#[derive(Debug)]
pub struct Permit {
    _guard: OwnedRwLockReadGuard<()>,
}

impl ShutdownBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a reader permit, or `Unavailable` once shutdown has run
    pub async fn enter(&self) -> Result<Permit> {
        if self.is_stopped() {
            return Err(OptiError::Unavailable);
        }
        let guard = self.lock.clone().read_owned().await;
        if self.is_stopped() {
            return Err(OptiError::Unavailable);
        }
        Ok(Permit { _guard: guard })
    }

    /// Wait for every permit to be released, then refuse all future ones
    pub async fn shutdown(&self) {
        let _writer = self.lock.write().await;
        self.stopped.store(true, Ordering::SeqCst);
        tracing::info!("Shutdown barrier drained");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShutdownHook for ShutdownBarrier {
    fn name(&self) -> &str {
        "barrier"
    }

    async fn shutdown(&self) -> Result<()> {
        ShutdownBarrier::shutdown(self).await;
        Ok(())
    }
}
