//! Observability.
//!
//! Everything logs through `tracing`; [`logging::init`] decides where the
//! events go. Per-request spans come from the `TraceLayer` on the router.

pub mod logging;
