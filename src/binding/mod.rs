//! Request binding.
//!
//! A [`Binder`] decodes some part of the request into a typed value.
//! [`Query`] reads the URL query string, [`Json`] the request body. Binders
//! leave the request as they found it, so several can run on one request.

use std::future::Future;

use axum::{
    body::{self, Body},
    extract,
    http::Request,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure to decode request data.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("bind query: {0}")]
    Query(String),

    #[error("bind json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bind json: request body is empty")]
    EmptyBody,

    #[error("bind json: read body: {0}")]
    Body(String),
}

/// Decodes request data into `T`.
pub trait Binder: Send + Sync {
    fn name(&self) -> &'static str;

    fn bind<T>(&self, request: &mut Request<Body>) -> impl Future<Output = Result<T, BindError>> + Send
    where
        T: DeserializeOwned + Send;
}

/// Binds the URL query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query;

impl Binder for Query {
    fn name(&self) -> &'static str {
        "query"
    }

    fn bind<T>(&self, request: &mut Request<Body>) -> impl Future<Output = Result<T, BindError>> + Send
    where
        T: DeserializeOwned + Send,
    {
        let result = extract::Query::<T>::try_from_uri(request.uri())
            .map(|extract::Query(value)| value)
            .map_err(|rejection| BindError::Query(rejection.body_text()));
        std::future::ready(result)
    }
}

/// Binds a JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Binder for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn bind<T>(&self, request: &mut Request<Body>) -> impl Future<Output = Result<T, BindError>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            let request_body = std::mem::take(request.body_mut());
            let bytes = body::to_bytes(request_body, usize::MAX)
                .await
                .map_err(|e| BindError::Body(e.to_string()))?;
            *request.body_mut() = Body::from(bytes.clone());

            if bytes.is_empty() {
                return Err(BindError::EmptyBody);
            }
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Page {
        page: u32,
        size: Option<u32>,
    }

    #[tokio::test]
    async fn test_query_binder() {
        let mut request = Request::builder()
            .uri("/?Action=list&page=3")
            .body(Body::empty())
            .unwrap();
        let page: Page = Query.bind(&mut request).await.unwrap();
        assert_eq!(page, Page { page: 3, size: None });
    }

    #[tokio::test]
    async fn test_query_binder_type_mismatch() {
        let mut request = Request::builder()
            .uri("/?page=three")
            .body(Body::empty())
            .unwrap();
        let err = Query.bind::<Page>(&mut request).await.unwrap_err();
        assert!(matches!(err, BindError::Query(_)));
    }

    #[tokio::test]
    async fn test_json_binder_leaves_body_readable() {
        let mut request = Request::builder()
            .method(Method::POST)
            .body(Body::from(r#"{"page":1,"size":20}"#))
            .unwrap();

        let first: Page = Json.bind(&mut request).await.unwrap();
        let second: Page = Json.bind(&mut request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.size, Some(20));
    }

    #[tokio::test]
    async fn test_json_binder_empty_body() {
        let mut request = Request::builder()
            .method(Method::POST)
            .body(Body::empty())
            .unwrap();
        let err = Json.bind::<Page>(&mut request).await.unwrap_err();
        assert!(matches!(err, BindError::EmptyBody));
    }

    #[tokio::test]
    async fn test_json_binder_malformed() {
        let mut request = Request::builder()
            .method(Method::POST)
            .body(Body::from("{\"page\":"))
            .unwrap();
        let err = Json.bind::<Page>(&mut request).await.unwrap_err();
        assert!(matches!(err, BindError::Json(_)));
    }

    #[test]
    fn test_binder_names() {
        assert_eq!(Query.name(), "query");
        assert_eq!(Json.name(), "json");
    }
}
