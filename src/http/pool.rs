//! Context pool.
//!
//! Contexts are recycled between requests to keep their buffers and maps
//! allocated. The pool is a bounded lock-free queue; when it is empty a new
//! context is built, when it is full a released context is simply dropped.

use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{body::Body, http::Request};
use crossbeam::queue::ArrayQueue;

use super::Context;

/// Bounded pool of reusable [`Context`]s.
pub struct ContextPool {
    idle: ArrayQueue<Box<Context>>,
    created: AtomicUsize,
}

impl ContextPool {
    /// Create a pool keeping at most `capacity` idle contexts (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: ArrayQueue::new(capacity.max(1)),
            created: AtomicUsize::new(0),
        }
    }

    /// Take a clean context and bind it to `request`.
    ///
    /// The context goes back to the pool when the returned guard is dropped.
    pub fn acquire(
        &self,
        request: Request<Body>,
        remote_addr: Option<SocketAddr>,
    ) -> PooledContext<'_> {
        let mut ctx = self.idle.pop().unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Box::new(Context::new())
        });
        ctx.reset();
        ctx.attach(request, remote_addr);

        PooledContext {
            ctx: Some(ctx),
            pool: self,
        }
    }

    fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        if self.idle.push(ctx).is_err() {
            tracing::trace!("Context pool full, dropping context");
        }
    }

    /// Contexts currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.idle.capacity()
    }

    /// Contexts allocated over the lifetime of the pool.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool")
            .field("idle", &self.idle())
            .field("capacity", &self.capacity())
            .field("created", &self.created())
            .finish()
    }
}

/// A context on loan from a [`ContextPool`].
///
/// Dropping the guard resets the context and returns it to the pool. A
/// context dropped during a panic is discarded instead.
#[derive(Debug)]
pub struct PooledContext<'a> {
    ctx: Option<Box<Context>>,
    pool: &'a ContextPool,
}

impl PooledContext<'_> {
    /// Return the context to the pool now.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        // Only `Drop` takes the box out.
        self.ctx.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        let Some(ctx) = self.ctx.take() else {
            return;
        };
        if std::thread::panicking() {
            return;
        }
        self.pool.release(ctx);
    }
}
