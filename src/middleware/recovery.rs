//! Panic recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::http::StatusCode;
use futures_util::FutureExt;
use serde_json::Value;

use crate::error::Error;
use crate::handler::{handler_fn, middleware_fn, Middleware};

/// Catch panics raised by the rest of the chain.
///
/// With `Some(body)` the panic is answered with `body` as JSON and status
/// 500, and the chain succeeds. With `None` the panic becomes
/// [`Error::Panic`] and the server's uniform error response applies.
pub fn recovery(body: Option<Value>) -> Middleware {
    middleware_fn(move |next| {
        let body = body.clone();
        handler_fn(move |ctx| {
            let next = next.clone();
            let body = body.clone();
            Box::pin(async move {
                let payload = match AssertUnwindSafe(next(ctx)).catch_unwind().await {
                    Ok(result) => return result,
                    Err(payload) => payload,
                };

                let message = panic_message(payload.as_ref());
                tracing::error!(action = %ctx.action(), panic = %message, "Handler panicked");

                match body {
                    Some(body) => ctx.json(StatusCode::INTERNAL_SERVER_ERROR, &body),
                    None => Err(Error::Panic(message)),
                }
            })
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
