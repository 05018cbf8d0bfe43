//! Action extraction.
//!
//! The action name comes from the `Action` query parameter on GET and from
//! the top-level `Action` field of the JSON body on POST. A POST body is
//! read once, kept on the context, and put back on the request so binders
//! can read it again.

use std::fmt;

use axum::{
    body::{self, Body},
    http::Method,
};
use serde::de::{Deserializer as _, IgnoredAny, MapAccess, Visitor};
use serde_json::Value;

use super::Context;
use crate::error::{Error, Result};

/// Query parameter and JSON field carrying the action name.
pub const ACTION_KEY: &str = "Action";

/// Fill in `ctx.action()` from the request.
///
/// Bodies larger than `body_limit` fail with [`Error::Body`].
pub async fn extract_action(ctx: &mut Context, body_limit: usize) -> Result<()> {
    let method = ctx.method().clone();

    let action = match method {
        Method::GET => ctx.get_query(ACTION_KEY).unwrap_or_default().to_owned(),
        Method::POST => {
            let request_body = std::mem::take(ctx.request_mut().body_mut());
            let bytes = body::to_bytes(request_body, body_limit)
                .await
                .map_err(|e| Error::Body(e.to_string()))?;
            *ctx.request_mut().body_mut() = Body::from(bytes.clone());

            let action = action_from_json(&bytes);
            ctx.set_buffer(bytes);
            action
        }
        ref other => return Err(Error::UnsupportedMethod(other.clone())),
    };

    if action.is_empty() {
        return Err(Error::EmptyAction(method));
    }

    ctx.set_action(&action);
    Ok(())
}

/// Read the top-level `Action` field of a JSON document.
///
/// Only the top-level object is scanned, and only up to the first `Action`
/// key, so a malformed tail does not hide it and the first duplicate wins.
/// Strings are taken as-is, other scalars and containers in their JSON text
/// form. Missing fields, `null`, non-object documents and undecodable
/// prefixes all yield "".
pub fn action_from_json(body: &[u8]) -> String {
    let mut found = None;
    let mut de = serde_json::Deserializer::from_slice(body);
    // Stopping at the key leaves the rest unread, so the result is an error
    // whenever the object has more entries; `found` is what counts.
    let scanned = de.deserialize_map(FirstAction(&mut found));

    match found {
        Some(Value::String(action)) => action,
        Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
        None => {
            if let Err(e) = scanned {
                tracing::debug!(error = %e, "No action in request body");
            }
            String::new()
        }
    }
}

/// Map visitor that stores the first `Action` value and stops there.
struct FirstAction<'a>(&'a mut Option<Value>);

impl<'de> Visitor<'de> for FirstAction<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        while let Some(key) = map.next_key::<String>()? {
            if key == ACTION_KEY {
                *self.0 = Some(map.next_value()?);
                return Ok(());
            }
            map.next_value::<IgnoredAny>()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn context(method: Method, uri: &str, body: &'static str) -> Context {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        Context::for_request(request)
    }

    #[tokio::test]
    async fn test_get_reads_query_parameter() {
        let mut ctx = context(Method::GET, "/?Action=exec&test=1", "");
        extract_action(&mut ctx, 1024).await.unwrap();

        assert_eq!(ctx.action(), "exec");
        assert!(ctx.body().is_empty());
    }

    #[tokio::test]
    async fn test_get_ignores_path() {
        let mut ctx = context(Method::GET, "/any/path/at/all?Action=exec", "");
        extract_action(&mut ctx, 1024).await.unwrap();
        assert_eq!(ctx.action(), "exec");
    }

    #[tokio::test]
    async fn test_get_without_action() {
        let mut ctx = context(Method::GET, "/?action=lowercase", "");
        let err = extract_action(&mut ctx, 1024).await.unwrap_err();
        assert_eq!(err.to_string(), "action is empty, method[GET]");
    }

    #[tokio::test]
    async fn test_post_reads_body_and_keeps_it() {
        let body = r#"{"Action":"exec","test":1}"#;
        let mut ctx = context(Method::POST, "/", body);
        extract_action(&mut ctx, 1024).await.unwrap();

        assert_eq!(ctx.action(), "exec");
        assert_eq!(ctx.body().as_ref(), body.as_bytes());

        // the body is still readable downstream
        let request_body = std::mem::take(ctx.request_mut().body_mut());
        let replay = body::to_bytes(request_body, 1024).await.unwrap();
        assert_eq!(replay.as_ref(), body.as_bytes());
    }

    #[tokio::test]
    async fn test_post_ignores_query_action() {
        let mut ctx = context(Method::POST, "/?Action=fromquery", r#"{"other":1}"#);
        let err = extract_action(&mut ctx, 1024).await.unwrap_err();
        assert_eq!(err.to_string(), "action is empty, method[POST]");
    }

    #[tokio::test]
    async fn test_post_malformed_json_is_empty_action() {
        let mut ctx = context(Method::POST, "/", "{not json");
        let err = extract_action(&mut ctx, 1024).await.unwrap_err();
        assert!(matches!(err, Error::EmptyAction(Method::POST)));
    }

    #[tokio::test]
    async fn test_post_body_over_limit() {
        let mut ctx = context(Method::POST, "/", r#"{"Action":"exec","pad":"xxxxxxxx"}"#);
        let err = extract_action(&mut ctx, 8).await.unwrap_err();
        assert!(matches!(err, Error::Body(_)));
    }

    #[tokio::test]
    async fn test_other_methods_rejected() {
        for method in [Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
            let mut ctx = context(method.clone(), "/?Action=exec", "");
            let err = extract_action(&mut ctx, 1024).await.unwrap_err();
            assert_eq!(err.to_string(), format!("unsupported method[{method}]"));
            assert_eq!(ctx.action(), "");
        }
    }

    #[test]
    fn test_action_from_json_value_kinds() {
        assert_eq!(action_from_json(br#"{"Action":"exec"}"#), "exec");
        assert_eq!(action_from_json(br#"{"Action":42}"#), "42");
        assert_eq!(action_from_json(br#"{"Action":true}"#), "true");
        assert_eq!(action_from_json(br#"{"Action":null}"#), "");
        assert_eq!(action_from_json(br#"{"action":"exec"}"#), "");
        assert_eq!(action_from_json(br#"["Action"]"#), "");
        assert_eq!(action_from_json(b""), "");
    }

    #[test]
    fn test_action_from_json_ignores_malformed_tail() {
        assert_eq!(action_from_json(br#"{"Action":"exec","test":"#), "exec");
        assert_eq!(action_from_json(br#"{"Action":"exec","test":}"#), "exec");
        assert_eq!(action_from_json(br#"{"test":1,"Action":"exec","#), "exec");
        assert_eq!(action_from_json(br#"{"nested":{"Action":"no"},"Action":"yes"}"#), "yes");
        assert_eq!(action_from_json(br#"{"Action":"ex"#), "");
    }

    #[test]
    fn test_action_from_json_first_duplicate_wins() {
        assert_eq!(action_from_json(br#"{"Action":"first","Action":"second"}"#), "first");
    }

    #[tokio::test]
    async fn test_post_truncated_body_still_dispatches() {
        let body = r#"{"Action":"exec","test":"#;
        let mut ctx = context(Method::POST, "/", body);
        extract_action(&mut ctx, 1024).await.unwrap();

        assert_eq!(ctx.action(), "exec");
        assert_eq!(ctx.body().as_ref(), body.as_bytes());
    }
}
