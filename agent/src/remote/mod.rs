//! Transports for the remote persistence API.

mod http;

pub use http::*;
