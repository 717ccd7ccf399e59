//! Error types for OptiKV
//!
//! Provides a unified error type for all operations.
//!
//! A rejected transaction (condition mismatch) is *not* an error; it is
//! reported through [`crate::txn::TxnOutcome::applied`].

use thiserror::Error;

/// Result type alias using OptiError
pub type Result<T> = std::result::Result<T, OptiError>;

/// Unified error type for OptiKV operations
#[derive(Debug, Error)]
pub enum OptiError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Binlog Errors
    // -------------------------------------------------------------------------
    #[error("Binlog corruption detected at offset {offset}: {reason}")]
    BinlogCorruption { offset: u64, reason: String },

    #[error("Binlog write failed: {0}")]
    BinlogWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid swap handle: {0}")]
    InvalidHandle(String),

    #[error("Swap allocator exhausted: cannot place {requested} bytes")]
    SwapExhausted { requested: usize },

    // -------------------------------------------------------------------------
    // Transaction Errors
    // -------------------------------------------------------------------------
    #[error("Key '{0}' is reserved and cannot be written by transactions")]
    ReservedKey(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Directory {0} is locked by another instance")]
    DirectoryLocked(String),

    #[error("Service unavailable: shutting down")]
    Unavailable,
}

impl OptiError {
    /// True when the error means the service refused work because it is stopping
    pub fn is_unavailable(&self) -> bool {
        matches!(self, OptiError::Unavailable)
    }
}

impl From<bincode::Error> for OptiError {
    fn from(e: bincode::Error) -> Self {
        OptiError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for OptiError {
    fn from(e: serde_json::Error) -> Self {
        OptiError::Protocol(e.to_string())
    }
}
