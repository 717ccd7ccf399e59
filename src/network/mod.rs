//! Network Module
//!
//! TCP server, per-connection handling and a small client.
//!
//! ## Architecture
//! - One tokio task accepting connections until stopped
//! - One task per connection reading request frames
//! - One task per request, so a slow transaction never blocks the
//!   connection's later requests, up to [`MAX_IN_FLIGHT`] at a time
//! - Replies written through the connection's [`SendSerializer`]

mod client;
mod connection;
mod sender;
mod server;

pub use client::Client;
pub use connection::Connection;
pub use sender::SendSerializer;
pub use server::{Server, ServerHandle};

/// Requests one connection may have running at once; the connection stops
/// reading frames until one of them finishes
pub const MAX_IN_FLIGHT: usize = 64;
