//! HTTP basic authentication.

use axum::http::{header::AUTHORIZATION, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::error::Error;
use crate::handler::{handler_fn, middleware_fn, Middleware};

const SCHEME: &str = "basic";

/// Require `Authorization: Basic` credentials matching `user` and `password`.
///
/// - matching credentials run the rest of the chain
/// - wrong credentials answer `body` with 405
/// - a missing or non-basic header answers `body` with 401
/// - a basic header whose payload is not base64 fails with [`Error::Unauthorized`]
pub fn basic_auth(user: impl Into<String>, password: impl Into<String>, body: Value) -> Middleware {
    let user = user.into();
    let password = password.into();

    middleware_fn(move |next| {
        let user = user.clone();
        let password = password.clone();
        let body = body.clone();
        handler_fn(move |ctx| {
            let next = next.clone();
            let user = user.clone();
            let password = password.clone();
            let body = body.clone();
            Box::pin(async move {
                let encoded = ctx
                    .request_header(AUTHORIZATION.as_str())
                    .and_then(basic_payload)
                    .map(str::to_owned);

                let Some(encoded) = encoded else {
                    return ctx.json(StatusCode::UNAUTHORIZED, &body);
                };

                let decoded = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| Error::Unauthorized(e.to_string()))?;
                let credentials = String::from_utf8_lossy(&decoded);

                match credentials.split_once(':') {
                    Some((u, p)) if u == user && p == password => next(ctx).await,
                    Some(_) => {
                        tracing::warn!(action = %ctx.action(), client_ip = %ctx.client_ip(), "Basic auth rejected");
                        ctx.json(StatusCode::METHOD_NOT_ALLOWED, &body)
                    }
                    None => ctx.json(StatusCode::UNAUTHORIZED, &body),
                }
            })
        })
    })
}

/// The part after `Basic `, if `header` uses the basic scheme.
fn basic_payload(header: &str) -> Option<&str> {
    let scheme = header.get(..SCHEME.len())?;
    let rest = header.get(SCHEME.len()..)?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return None;
    }
    rest.strip_prefix(' ').filter(|payload| !payload.is_empty())
}
