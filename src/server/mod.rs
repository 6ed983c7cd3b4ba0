//! HTTP server for sexton
//!
//! Named routes (alarm, worker, content, health) are handled locally;
//! everything else flows through the caching gateway in front of the
//! content app origin.

pub mod http;

pub use http::{run, AppState};
