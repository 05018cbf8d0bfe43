//! Error types for the action server.
//!
//! Every failure raised while extracting, dispatching or handling an action
//! ends up as an [`Error`]; the top-level handler turns it into the uniform
//! `{"code":5000,"message":...}` response.

use axum::http::Method;
use thiserror::Error;

use crate::binding::BindError;
use crate::render::RenderError;

/// Main error type for request processing.
#[derive(Debug, Error)]
pub enum Error {
    /// Request method outside the GET/POST dispatch protocol.
    #[error("unsupported method[{0}]")]
    UnsupportedMethod(Method),

    /// No action could be extracted from the request.
    #[error("action is empty, method[{0}]")]
    EmptyAction(Method),

    /// Dispatcher invoked without an action on the context.
    #[error("no action")]
    NoAction,

    /// Action name not present in the registry.
    #[error("invalid action[{0}]")]
    InvalidAction(String),

    /// Reading the request body failed.
    #[error("read body: {0}")]
    Body(String),

    /// Decoding request data into a typed value failed.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// Serializing a response failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// I/O error from the response sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error outside of binding and rendering.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials header could not be decoded.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A handler panicked and a recovery middleware turned it into an error.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// Business error returned by a handler.
    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Build a handler error from a plain message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Error::Handler(message.to_string().into())
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Misuse of [`ActionRegistry::try_register`](crate::handler::ActionRegistry::try_register).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("the action must not be empty")]
    EmptyAction,
}
