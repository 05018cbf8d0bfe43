//! Handler and middleware composition.
//!
//! Provides:
//! - [`HandlerFunc`] - the terminal function implementing one action
//! - [`Middleware`] - a transformation from "next handler" to "wrapped handler"
//! - [`ActionRegistry`] - maps action names to fully composed handlers
//!
//! # Example
//!
//! ```ignore
//! use action_server::handler::{handler_fn, middleware_fn, apply_middleware};
//!
//! let timing = middleware_fn(|next| {
//!     handler_fn(move |ctx| {
//!         let next = next.clone();
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             let result = next(ctx).await;
//!             tracing::debug!(elapsed = ?start.elapsed(), "Action finished");
//!             result
//!         })
//!     })
//! });
//!
//! let exec = handler_fn(|ctx| Box::pin(async move {
//!     ctx.string(StatusCode::OK, "done")
//! }));
//!
//! let composed = apply_middleware(exec, &[timing]);
//! ```

mod registry;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::http::Context;

pub use registry::ActionRegistry;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A handler borrows the request context for the duration of its future.
pub type HandlerFunc =
    Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Wraps a handler; may run code before and after `next`, or skip it entirely.
pub type Middleware = Arc<dyn Fn(HandlerFunc) -> HandlerFunc + Send + Sync>;

/// Turn a closure or fn item into a [`HandlerFunc`].
///
/// Going through this function lets the compiler infer the higher-ranked
/// signature, so `|ctx| Box::pin(async move { ... })` type-checks.
pub fn handler_fn<F>(f: F) -> HandlerFunc
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Turn a closure into a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(HandlerFunc) -> HandlerFunc + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Fold `middlewares` around `handler`, first element outermost.
///
/// `[m0, m1, m2]` applied to `h` yields `m0(m1(m2(h)))`.
pub fn apply_middleware(mut handler: HandlerFunc, middlewares: &[Middleware]) -> HandlerFunc {
    for middleware in middlewares.iter().rev() {
        handler = middleware(handler);
    }
    handler
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::test_support::*;
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_first_middleware_is_outermost() {
        let trail: Trail = Arc::new(Mutex::new(Vec::new()));
        let composed = apply_middleware(
            recording_handler(trail.clone()),
            &[
                tracer("a", trail.clone()),
                tracer("b", trail.clone()),
                tracer("c", trail.clone()),
            ],
        );

        let mut ctx = Context::new();
        composed(&mut ctx).await.unwrap();

        assert_eq!(
            *trail.lock().unwrap(),
            vec!["a-before", "b-before", "c-before", "handler", "c-after", "b-after", "a-after"]
        );
    }

    #[tokio::test]
    async fn test_no_middleware_returns_handler() {
        let trail: Trail = Arc::new(Mutex::new(Vec::new()));
        let composed = apply_middleware(recording_handler(trail.clone()), &[]);

        let mut ctx = Context::new();
        composed(&mut ctx).await.unwrap();
        assert_eq!(*trail.lock().unwrap(), vec!["handler"]);
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let trail: Trail = Arc::new(Mutex::new(Vec::new()));
        let deny = middleware_fn(|_next| {
            handler_fn(|_ctx| Box::pin(async { Err(Error::msg("denied")) }))
        });
        let composed = apply_middleware(
            recording_handler(trail.clone()),
            &[tracer("outer", trail.clone()), deny],
        );

        let mut ctx = Context::new();
        let err = composed(&mut ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "denied");
        assert_eq!(*trail.lock().unwrap(), vec!["outer-before", "outer-after"]);
    }

    #[tokio::test]
    async fn test_middleware_can_run_next_twice() {
        let trail: Trail = Arc::new(Mutex::new(Vec::new()));
        let twice = middleware_fn(|next| {
            handler_fn(move |ctx| {
                let next = next.clone();
                Box::pin(async move {
                    next(ctx).await?;
                    next(ctx).await
                })
            })
        });
        let composed = apply_middleware(recording_handler(trail.clone()), &[twice]);

        let mut ctx = Context::new();
        composed(&mut ctx).await.unwrap();
        assert_eq!(*trail.lock().unwrap(), vec!["handler", "handler"]);
    }
}
