//! Action-dispatched HTTP server.
//!
//! Every request arrives on one endpoint. The handler is picked by the
//! `Action` query parameter (GET) or the top-level `Action` JSON field
//! (POST), then run inside a chain of global and per-action middlewares.

pub mod binding;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod render;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use handler::{handler_fn, middleware_fn, BoxFuture, HandlerFunc, Middleware};
pub use http::{ActionServer, Context, HttpServer};
pub use lifecycle::Shutdown;
