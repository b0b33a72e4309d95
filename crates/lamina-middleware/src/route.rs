//! Route-level middleware application.
//!
//! [`apply`] is a decorator-style composition operator: it wraps one route
//! handler with one resolved middleware's dispatch logic. The reference is
//! resolved at decoration time, so a transport-capable middleware is
//! rejected before the route is ever registered; the middleware instance
//! itself is constructed per request, at call time, with the captured
//! construction arguments.
//!
//! The wrapped handler recovers "the current request" from the context
//! channel rather than from its own parameters; a route served by a
//! pipeline without the context-channel middleware fails hard with
//! [`KernelError::MissingRequestContext`], never silently.

use crate::middleware::{BoxFuture, Next};
use crate::resolver::{MiddlewareRef, ResolvedMiddleware, Resolver};
use crate::scope;
use bytes::Bytes;
use lamina_core::{ConstructionArgs, KernelError, KernelResult, Response};
use std::collections::HashMap;
use std::sync::Arc;

/// The original call arguments of one route invocation.
#[derive(Debug, Clone, Default)]
pub struct RouteInvocation {
    params: HashMap<String, String>,
    body: Bytes,
}

impl RouteInvocation {
    /// Creates an invocation from extracted path parameters and the request
    /// body.
    #[must_use]
    pub fn new(params: HashMap<String, String>, body: Bytes) -> Self {
        Self { params, body }
    }

    /// Returns a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns all path parameters.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// A route handler: the unit the applicator wraps.
///
/// Wrapping is shape-preserving, so applications stack; the outermost
/// decorator's before-logic runs first.
pub type RouteHandlerFn =
    Arc<dyn Fn(RouteInvocation) -> BoxFuture<'static, KernelResult<Response>> + Send + Sync>;

/// Creates a route handler from an async closure.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use lamina_core::{Response, ResponseExt};
/// use lamina_middleware::route;
///
/// let handler = route::handler(|invocation| async move {
///     let id = invocation.param("id").unwrap_or("unknown").to_string();
///     Ok(Response::json(StatusCode::OK, &serde_json::json!({ "id": id })))
/// });
/// ```
pub fn handler<F, Fut>(func: F) -> RouteHandlerFn
where
    F: Fn(RouteInvocation) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = KernelResult<Response>> + Send + 'static,
{
    Arc::new(move |invocation| Box::pin(func(invocation)))
}

/// Wraps one route handler with one middleware's dispatch logic.
///
/// Fails at decoration time if the reference does not resolve, or resolves
/// to a transport-capable middleware.
///
/// Per invocation, the wrapped handler:
/// 1. recovers the current request from the context channel
///    (absent → [`KernelError::MissingRequestContext`]);
/// 2. constructs the middleware instance with the captured arguments;
/// 3. dispatches with the recovered request and a continuation that invokes
///    the original handler with the original call arguments.
///
/// Kernel errors from the inner handler normalize to error responses at the
/// continuation boundary, since the chain contract produces a response.
pub fn apply(
    resolver: &Resolver,
    reference: &MiddlewareRef,
    args: ConstructionArgs,
    inner: RouteHandlerFn,
) -> KernelResult<RouteHandlerFn> {
    let factory = match resolver.resolve(reference)? {
        ResolvedMiddleware::Chain(factory) => factory,
        ResolvedMiddleware::Transport(factory) => {
            return Err(KernelError::TransportNotRouteApplicable {
                name: factory.name().to_string(),
            });
        }
    };

    Ok(Arc::new(move |invocation: RouteInvocation| {
        let factory = factory.clone();
        let args = args.clone();
        let inner = inner.clone();

        Box::pin(async move {
            let stored = scope::try_current()?;
            let instance = factory.build(&args)?;
            let request = stored.to_request();

            let next = Next::handler(move |_request| {
                Box::pin(async move {
                    match inner(invocation).await {
                        Ok(response) => response,
                        Err(err) => {
                            tracing::error!(error = %err, "route handler failed");
                            err.to_response()
                        }
                    }
                }) as BoxFuture<'static, Response>
            });

            Ok(instance.dispatch(request, next).await)
        })
    }))
}
