//! Action registry and dispatcher.
//!
//! The registry maps action names to handlers that already carry their
//! per-action middleware chain. It is the only shared mutable structure
//! besides the context pool.
//!
//! # Design Decisions
//! - Reader/writer lock: lookups share, registration is exclusive
//! - The lock is released before the handler runs; nothing awaits under it
//! - Re-registering a name replaces the previous handler

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{apply_middleware, HandlerFunc, Middleware};
use crate::error::{Error, RegisterError, Result};
use crate::http::Context;

/// Registry mapping action names to composed handlers.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: RwLock<HashMap<String, HandlerFunc>>,
}

impl ActionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `action`, wrapped in `middlewares`.
    ///
    /// # Panics
    ///
    /// Panics when `action` is empty. Registration happens at startup and an
    /// unnamed action is a programming error.
    #[track_caller]
    pub fn register(
        &self,
        action: impl Into<String>,
        handler: HandlerFunc,
        middlewares: &[Middleware],
    ) {
        if let Err(e) = self.try_register(action, handler, middlewares) {
            panic!("ActionRegistry::register: {e}");
        }
    }

    /// Like [`register`](Self::register), returning an error instead of panicking.
    pub fn try_register(
        &self,
        action: impl Into<String>,
        handler: HandlerFunc,
        middlewares: &[Middleware],
    ) -> std::result::Result<(), RegisterError> {
        let action = action.into();
        if action.is_empty() {
            return Err(RegisterError::EmptyAction);
        }

        let handler = apply_middleware(handler, middlewares);

        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.insert(action.clone(), handler).is_some() {
            tracing::warn!(action = %action, "Action registered twice, previous handler replaced");
        } else {
            tracing::debug!(action = %action, middlewares = middlewares.len(), "Action registered");
        }
        Ok(())
    }

    /// Get the composed handler for `action`.
    pub fn handler(&self, action: &str) -> Option<HandlerFunc> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(action)
            .cloned()
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Look up the context's action and run its handler.
    ///
    /// The handler's outcome is returned verbatim.
    pub async fn dispatch(&self, ctx: &mut Context) -> Result<()> {
        if ctx.action().is_empty() {
            return Err(Error::NoAction);
        }

        let handler = self
            .handler(ctx.action())
            .ok_or_else(|| Error::InvalidAction(ctx.action().to_string()))?;

        handler(ctx).await
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}
