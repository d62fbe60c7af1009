//! Bearer-token guard for the local surface.

mod middleware;

pub use middleware::*;
