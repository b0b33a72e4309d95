//! The chain-capable dispatch contract.
//!
//! This module defines the [`ChainMiddleware`] trait that every chain-capable
//! middleware satisfies, whatever shape it was written in. A middleware
//! receives the request and a [`Next`] continuation; calling the continuation
//! advances to the next layer, and not calling it short-circuits the chain
//! with the middleware's own response.
//!
//! Plain functions enter the contract through two explicit adapters:
//!
//! - [`Interceptor`] wraps a function that takes the continuation and owns
//!   the full request/response exchange.
//! - [`Observer`] wraps a side-effect-only function; the adapter invokes the
//!   continuation unconditionally after the function returns.
//!
//! The two shapes let authors write either full interceptors or
//! pre-request-only hooks through the same registration mechanism.
//!
//! # Example
//!
//! ```
//! use lamina_middleware::{ChainMiddleware, Interceptor};
//!
//! let timing = Interceptor::new("timing", |request, next| async move {
//!     let start = std::time::Instant::now();
//!     let response = next.run(request).await;
//!     tracing::debug!(elapsed = ?start.elapsed(), "request finished");
//!     response
//! });
//! assert_eq!(timing.name(), "timing");
//! ```

use lamina_core::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future that resolves to `T`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The chain-capable middleware contract.
///
/// # Invariants
///
/// - `next.run()` may be called at most once; `Next` is consumed by running it
/// - Not calling `next.run()` short-circuits the chain; the returned response
///   becomes the final response
pub trait ChainMiddleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used for logging and for the
    /// pipeline's stage bookkeeping.
    fn name(&self) -> &str;

    /// Processes the request, using `next` to advance to the next layer.
    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response>;
}

/// The continuation that advances control to the next layer in the chain.
///
/// Running a `Next` consumes it, so it can be invoked at most once.
pub struct Next {
    inner: NextInner,
}

enum NextInner {
    /// More middleware to process.
    Chain {
        middleware: Arc<dyn ChainMiddleware>,
        next: Box<Next>,
    },
    /// End of chain: invoke the terminal handler.
    Handler(Box<dyn FnOnce(Request) -> BoxFuture<'static, Response> + Send>),
}

impl Next {
    /// Creates a `Next` that will invoke the given middleware, then `next`.
    pub(crate) fn chain(middleware: Arc<dyn ChainMiddleware>, next: Next) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub(crate) fn handler<F>(f: F) -> Self
    where
        F: FnOnce(Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the next middleware or the terminal handler.
    pub async fn run(self, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.dispatch(request, *next).await,
            NextInner::Handler(handler) => handler(request).await,
        }
    }
}

/// A chain middleware built from a full interceptor function.
///
/// The function receives the request and the continuation and is responsible
/// for producing the final response, either by running the continuation or by
/// short-circuiting.
pub struct Interceptor<F> {
    name: String,
    func: F,
}

impl<F, Fut> Interceptor<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    /// Creates a named interceptor from the given function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F, Fut> ChainMiddleware for Interceptor<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response> {
        Box::pin((self.func)(request, next))
    }
}

/// A chain middleware built from a side-effect-only function.
///
/// The function observes the request; afterwards the adapter invokes the
/// continuation unconditionally, so an observer can never short-circuit.
/// The returned future is `'static`: the function reads what it needs from
/// the borrowed request and moves owned data into the future.
pub struct Observer<F> {
    name: String,
    func: F,
}

impl<F> Observer<F>
where
    F: Fn(&Request) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    /// Creates a named observer from the given function.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> ChainMiddleware for Observer<F>
where
    F: Fn(&Request) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            (self.func)(&request).await;
            next.run(request).await
        })
    }
}
