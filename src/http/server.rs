//! Action server and HTTP listener glue.
//!
//! # Responsibilities
//! - Own the action registry, the global middleware chain and the context pool
//! - Turn each inbound request into a pooled [`Context`], extract its action
//!   and run the composed chain
//! - Convert any failure into the uniform `{"code":5000,"message":...}` body
//! - Bind the whole thing to an axum router with a single catch-all route
//!
//! # Design Decisions
//! - Every path and method reaches the same entry point; the action
//!   selects the handler, never the URL
//! - The global chain is composed once, on first use, and rebuilt only if
//!   middlewares are added afterwards
//! - Extraction failures skip the global chain entirely

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::action::extract_action;
use super::pool::{ContextPool, PooledContext};
use super::Context;
use crate::config::ServerConfig;
use crate::error::{Error, RegisterError, Result};
use crate::handler::{apply_middleware, handler_fn, ActionRegistry, BoxFuture, HandlerFunc, Middleware};
use crate::lifecycle::Shutdown;

/// Error code carried by every framework-generated failure body.
pub const ERROR_CODE: u16 = 5000;

/// Action-dispatched request server.
pub struct ActionServer {
    registry: Arc<ActionRegistry>,
    middlewares: Vec<Middleware>,
    pipeline: OnceLock<HandlerFunc>,
    pool: ContextPool,
    config: ServerConfig,
}

impl Default for ActionServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionServer {
    /// Create a server with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(ActionRegistry::new()),
            middlewares: Vec::new(),
            pipeline: OnceLock::new(),
            pool: ContextPool::new(config.pool.capacity),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Append global middlewares; they run for every dispatched request,
    /// outside any per-action middleware, in the order given.
    pub fn use_middleware(&mut self, middlewares: impl IntoIterator<Item = Middleware>) -> &mut Self {
        self.middlewares.extend(middlewares);
        self.pipeline = OnceLock::new();
        self
    }

    /// Register `handler` for `action`.
    ///
    /// # Panics
    ///
    /// Panics when `action` is empty.
    #[track_caller]
    pub fn register<F>(&self, action: &str, handler: F) -> &Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.registry.register(action, handler_fn(handler), &[]);
        self
    }

    /// Register `handler` for `action` behind per-action `middlewares`.
    ///
    /// # Panics
    ///
    /// Panics when `action` is empty.
    #[track_caller]
    pub fn register_with<F>(&self, action: &str, handler: F, middlewares: &[Middleware]) -> &Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.registry.register(action, handler_fn(handler), middlewares);
        self
    }

    /// Register an already composed [`HandlerFunc`], reporting misuse as an error.
    pub fn try_register(
        &self,
        action: &str,
        handler: HandlerFunc,
        middlewares: &[Middleware],
    ) -> std::result::Result<(), RegisterError> {
        self.registry.try_register(action, handler, middlewares)
    }

    /// Composed handler registered for `action`.
    pub fn handler(&self, action: &str) -> Option<HandlerFunc> {
        self.registry.handler(action)
    }

    /// Borrow a clean context for `request` from the pool.
    pub fn acquire_context(
        &self,
        request: Request<Body>,
        remote_addr: Option<SocketAddr>,
    ) -> PooledContext<'_> {
        self.pool.acquire(request, remote_addr)
    }

    /// Give a context back to the pool. Dropping the guard does the same.
    pub fn release_context(&self, ctx: PooledContext<'_>) {
        ctx.release();
    }

    fn pipeline(&self) -> &HandlerFunc {
        self.pipeline.get_or_init(|| {
            let registry = self.registry.clone();
            let dispatch = handler_fn(move |ctx| {
                let registry = registry.clone();
                Box::pin(async move { registry.dispatch(ctx).await })
            });
            apply_middleware(dispatch, &self.middlewares)
        })
    }

    /// Process one request end to end.
    pub async fn serve(&self, request: Request<Body>) -> Response {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let mut ctx = self.acquire_context(request, remote_addr);

        match extract_action(&mut ctx, self.config.listener.max_body_bytes).await {
            Ok(()) => {
                if let Err(err) = (self.pipeline())(&mut *ctx).await {
                    tracing::warn!(action = %ctx.action(), error = %err, "Action failed");
                    error_response(&mut ctx, &err);
                }
            }
            Err(err) => {
                tracing::debug!(method = %ctx.method(), error = %err, "Action extraction failed");
                error_response(&mut ctx, &err);
            }
        }

        ctx.take_response()
    }

    /// Axum router sending every path and method to [`serve`](Self::serve).
    #[allow(deprecated)]
    pub fn router(self: Arc<Self>) -> Router {
        let request_secs = self.config.timeouts.request_secs;
        let router = Router::new().fallback(serve_http).with_state(self);

        let router = if request_secs > 0 {
            router.layer(TimeoutLayer::new(Duration::from_secs(request_secs)))
        } else {
            router
        };
        router.layer(TraceLayer::new_for_http())
    }
}

impl std::fmt::Debug for ActionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionServer")
            .field("registry", &self.registry)
            .field("middlewares", &self.middlewares.len())
            .field("pool", &self.pool)
            .finish()
    }
}

async fn serve_http(State(server): State<Arc<ActionServer>>, request: Request<Body>) -> Response {
    server.serve(request).await
}

/// Render `err` as `{"code":5000,"message":"<err>"}` with status 500.
///
/// If the handler already sent headers the status stays as sent and the
/// error body is appended to what was written.
pub fn error_response(ctx: &mut Context, err: &Error) {
    let body = json!({
        "code": ERROR_CODE,
        "message": err.to_string(),
    });
    if let Err(e) = ctx.json(StatusCode::INTERNAL_SERVER_ERROR, &body) {
        tracing::error!(error = %e, "Failed to render error response");
    }
}

/// HTTP listener running an [`ActionServer`].
pub struct HttpServer {
    server: Arc<ActionServer>,
}

impl HttpServer {
    pub fn new(server: ActionServer) -> Self {
        Self {
            server: Arc::new(server),
        }
    }

    pub fn server(&self) -> &Arc<ActionServer> {
        &self.server
    }

    /// Accept connections on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            actions = self.server.registry().len(),
            "HTTP server starting"
        );

        let app = self
            .server
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
