//! HTTP request handling.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum fallback, every path)
//!     → pool.rs (borrow a clean Context)
//!     → action.rs (Action from query or JSON body)
//!     → global middlewares → registry dispatch → per-action middlewares → handler
//!     → response.rs (tracked writer, buffered into the axum Response)
//!     → Send to client
//! ```

pub mod action;
pub mod context;
pub mod pool;
pub mod response;
pub mod server;

pub use context::Context;
pub use pool::{ContextPool, PooledContext};
pub use response::{BufferedSink, ResponseSink, ResponseWriter, TrackedWriter};
pub use server::{error_response, ActionServer, HttpServer};
