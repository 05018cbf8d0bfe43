//! Request and response logging.
//!
//! `request_logger` tags every request with an `X-Trace-Id` and logs what
//! came in; `response_logger` logs what went out and how long it took.
//! Both log the trace id so the two lines can be joined.

use std::time::Instant;

use axum::http::{HeaderValue, Method};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::handler::{handler_fn, middleware_fn, Middleware};
use crate::http::{error_response, Context, ResponseWriter};
use crate::render::js_escape;

/// Request header carrying the per-request correlation id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Ensure an `X-Trace-Id` request header and log the incoming request.
///
/// The logged payload is the JSON body for POST and the query map otherwise.
pub fn request_logger() -> Middleware {
    middleware_fn(|next| {
        handler_fn(move |ctx| {
            let next = next.clone();
            Box::pin(async move {
                let trace_id = ensure_trace_id(ctx);
                let payload = request_payload(ctx);

                tracing::info!(
                    trace_id = %trace_id,
                    action = %ctx.action(),
                    method = %ctx.method(),
                    version = ?ctx.request().version(),
                    client_ip = %ctx.client_ip(),
                    body = %payload,
                    "Request received"
                );

                next(ctx).await
            })
        })
    })
}

/// Time the rest of the chain and log the response it produced.
///
/// A failing chain is answered with the uniform error body here, so the
/// logged response is the one the client sees; the middleware then succeeds.
pub fn response_logger() -> Middleware {
    middleware_fn(|next| {
        handler_fn(move |ctx| {
            let next = next.clone();
            Box::pin(async move {
                let start = Instant::now();
                if let Err(err) = next(ctx).await {
                    error_response(ctx, &err);
                }
                let elapsed = start.elapsed();

                let body = response_body(ctx);
                let status = ctx.writer().status();
                let trace_id = ctx.request_header(TRACE_ID_HEADER).unwrap_or_default();

                if status.is_client_error() || status.is_server_error() {
                    tracing::error!(
                        trace_id = %trace_id,
                        action = %ctx.action(),
                        status = status.as_u16(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        body = %body,
                        "Response sent"
                    );
                } else {
                    tracing::info!(
                        trace_id = %trace_id,
                        action = %ctx.action(),
                        status = status.as_u16(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        body = %body,
                        "Response sent"
                    );
                }
                Ok(())
            })
        })
    })
}

fn ensure_trace_id(ctx: &mut Context) -> String {
    if let Some(id) = ctx.request_header(TRACE_ID_HEADER).filter(|id| !id.is_empty()) {
        return id.to_owned();
    }

    let id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        ctx.request_mut().headers_mut().insert(TRACE_ID_HEADER, value);
    }
    id
}

fn request_payload(ctx: &mut Context) -> Value {
    if ctx.method() == Method::POST {
        return serde_json::from_slice(ctx.body()).unwrap_or_else(|_| Value::Object(Map::new()));
    }

    ctx.query_map()
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect::<Map<String, Value>>()
        .into()
}

/// Response body as text, with any JSONP padding removed.
fn response_body(ctx: &mut Context) -> String {
    let callback = ctx
        .get_query("callback")
        .filter(|cb| !cb.is_empty())
        .map(js_escape);
    let body = String::from_utf8_lossy(ctx.writer().sink().body()).into_owned();

    let Some(callback) = callback else {
        return body;
    };
    body.strip_prefix(callback.as_str())
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(");"))
        .map(str::to_owned)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::handler::{apply_middleware, HandlerFunc};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    fn context(method: Method, uri: &str) -> Context {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        Context::for_request(request)
    }

    fn failing() -> HandlerFunc {
        handler_fn(|_ctx| Box::pin(async { Err(Error::msg("exec failed")) }))
    }

    #[tokio::test]
    async fn test_request_logger_assigns_trace_id() {
        let chain = apply_middleware(
            handler_fn(|_ctx| Box::pin(async { Ok(()) })),
            &[request_logger()],
        );

        let mut ctx = context(Method::GET, "/?Action=exec");
        chain(&mut ctx).await.unwrap();

        let id = ctx.request_header(TRACE_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_request_logger_keeps_existing_trace_id() {
        let chain = apply_middleware(
            handler_fn(|_ctx| Box::pin(async { Ok(()) })),
            &[request_logger()],
        );

        let request = Request::builder()
            .uri("/?Action=exec")
            .header("X-Trace-Id", "upstream-123")
            .body(Body::empty())
            .unwrap();
        let mut ctx = Context::for_request(request);
        chain(&mut ctx).await.unwrap();

        assert_eq!(ctx.request_header(TRACE_ID_HEADER), Some("upstream-123"));
    }

    #[tokio::test]
    async fn test_response_logger_renders_inner_error() {
        let chain = apply_middleware(failing(), &[response_logger()]);

        let mut ctx = context(Method::GET, "/?Action=exec");
        chain(&mut ctx).await.unwrap();

        assert_eq!(ctx.writer().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ctx.writer().sink().body(),
            br#"{"code":5000,"message":"exec failed"}"#
        );
    }

    #[test]
    fn test_request_payload_for_get_and_post() {
        let mut ctx = context(Method::GET, "/?Action=exec&test=1&test=2");
        assert_eq!(request_payload(&mut ctx), json!({"Action": "exec", "test": "1"}));

        let mut ctx = context(Method::POST, "/");
        ctx.set_buffer(r#"{"Action":"exec","test":1}"#.into());
        assert_eq!(request_payload(&mut ctx), json!({"Action": "exec", "test": 1}));

        ctx.set_buffer("not json".into());
        assert_eq!(request_payload(&mut ctx), json!({}));
    }

    #[test]
    fn test_response_body_strips_jsonp_padding() {
        let mut ctx = context(Method::GET, "/?Action=exec&callback=cb");
        ctx.jsonp(StatusCode::OK, &json!({"a": 1})).unwrap();
        assert_eq!(response_body(&mut ctx), r#"{"a":1}"#);

        let mut ctx = context(Method::GET, "/?Action=exec");
        ctx.json(StatusCode::OK, &json!({"a": 1})).unwrap();
        assert_eq!(response_body(&mut ctx), r#"{"a":1}"#);
    }
}
