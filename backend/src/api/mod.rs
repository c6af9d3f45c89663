//! HTTP API module.
//!
//! Router, handlers, response types and the SSE activity stream.

pub mod exports;
pub mod logs;
pub mod orders;
pub mod products;
pub mod server;
pub mod types;

pub use server::{build_router, start_server, AppState};
pub use types::*;
pub use logs::*;
