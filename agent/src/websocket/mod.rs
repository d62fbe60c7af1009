//! WebSocket support for live outbox status.
//!
//! Clients connect and receive a `status` frame whenever the pending count,
//! dead-letter count, or sync status changes. They can also request a drain.

mod protocol;

pub use protocol::*;
