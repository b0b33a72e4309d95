//! Request logging middleware, written as plain functions.
//!
//! Two shapes, both entering the kernel through the same registration
//! mechanism:
//!
//! - [`middleware`] is a full interceptor: it times the exchange and logs
//!   method, path, status, and latency after the response comes back.
//! - [`echo`] is a pre-request observer: it logs the request line and
//!   continues unconditionally, never touching the response.

use crate::middleware::{BoxFuture, ChainMiddleware, Interceptor};
use crate::resolver::{ChainFactory, MiddlewareRef};
use lamina_core::{ConstructionArgs, KernelResult, Request};
use std::sync::Arc;
use std::time::Instant;

/// Creates the request logging interceptor.
#[must_use]
pub fn middleware() -> Arc<dyn ChainMiddleware> {
    Arc::new(Interceptor::new("request_log", |request: Request, next| {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        async move {
            let start = Instant::now();
            let response = next.run(request).await;
            tracing::info!(
                %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request"
            );
            response
        }
    }))
}

/// Builds `"request_log"` instances; construction arguments are ignored.
pub struct RequestLogFactory;

impl ChainFactory for RequestLogFactory {
    fn name(&self) -> &str {
        "request_log"
    }

    fn build(&self, _args: &ConstructionArgs) -> KernelResult<Arc<dyn ChainMiddleware>> {
        Ok(middleware())
    }
}

/// Creates the `"echo"` observer reference: logs the request line and
/// unconditionally continues.
#[must_use]
pub fn echo() -> MiddlewareRef {
    MiddlewareRef::observer("echo", |request: &Request| {
        tracing::info!(method = %request.method(), path = request.uri().path(), "echo");
        Box::pin(async {}) as BoxFuture<'static, ()>
    })
}
