//! Ready-made middlewares.
//!
//! | Middleware | Effect |
//! |---|---|
//! | [`recovery`] | turns handler panics into a 500 response or an error |
//! | [`request_logger`] | assigns `X-Trace-Id`, logs the incoming request |
//! | [`response_logger`] | logs status, latency and body of the response |
//! | [`basic_auth`] | guards actions with HTTP basic credentials |
//!
//! Register them globally with
//! [`ActionServer::use_middleware`](crate::http::ActionServer::use_middleware)
//! or per action with
//! [`ActionServer::register_with`](crate::http::ActionServer::register_with).

mod basic_auth;
mod recovery;
mod trace_log;

pub use basic_auth::basic_auth;
pub use recovery::recovery;
pub use trace_log::{request_logger, response_logger, TRACE_ID_HEADER};
