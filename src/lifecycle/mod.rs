//! Lifecycle Module
//!
//! Startup exclusivity and graceful shutdown.
//!
//! ## Shutdown Order
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ Server stop  │──▶│ Barrier drain    │──▶│ Database close   │
//! │ (no accepts) │   │ (writer permit,  │   │ (flush, sync log,│
//! │              │   │  set stop flag)  │   │  release LOCK)   │
//! └──────────────┘   └──────────────────┘   └──────────────────┘
//! ```
//! Collaborators are registered in dependency order at construction and run
//! in reverse by [`Shutdown::run`].

mod barrier;
mod dirlock;
mod shutdown;

pub use barrier::{Permit, ShutdownBarrier};
pub use dirlock::DirLock;
pub use shutdown::{Shutdown, ShutdownHook};
