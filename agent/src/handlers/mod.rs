//! Request handlers for outbox operations.

mod outbox;
mod websocket;

pub use outbox::*;
pub use websocket::*;
