//! Lifecycle management.
//!
//! ```text
//! Ctrl+C / Shutdown::trigger
//!     → listener stops accepting
//!     → in-flight requests drain
//!     → HttpServer::run returns
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
