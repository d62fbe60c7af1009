//! SQLite persistence for the outbox.

mod pool;
mod records;

pub use pool::*;
pub use records::*;
