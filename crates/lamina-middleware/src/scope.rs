//! The request context channel.
//!
//! A task-scoped slot that makes the in-flight request retrievable outside
//! the normal parameter chain. The chain contract always passes the request
//! explicitly; this channel exists solely so the route-level applicator can
//! recover "the current request" when it runs as a decorator rather than as
//! a pipeline stage.
//!
//! The slot is a tokio task-local: entering is a [`scope`] that restores the
//! prior value on every exit path, including panics and cancellation, and
//! concurrently interleaved requests on separate tasks never observe each
//! other's value.

use crate::middleware::{BoxFuture, ChainMiddleware, Next};
use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};
use http_body_util::{BodyExt, Full};
use lamina_core::{KernelError, KernelResult, Request, Response};
use std::future::Future;
use std::sync::Arc;

/// The stage name under which the context-channel middleware installs.
pub const REQUEST_SCOPE_STAGE: &str = "request_scope";

tokio::task_local! {
    static CURRENT_REQUEST: SharedRequest;
}

/// A cheaply shareable snapshot of the in-flight request.
pub type SharedRequest = Arc<StoredRequest>;

/// An immutable snapshot of a request's head and collected body.
#[derive(Debug, Clone)]
pub struct StoredRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl StoredRequest {
    /// Snapshots a request, returning the snapshot and an equivalent request
    /// to continue the chain with.
    ///
    /// The body is collected once; both the snapshot and the rebuilt request
    /// share the same bytes.
    pub async fn capture(request: Request) -> (SharedRequest, Request) {
        let (parts, body) = request.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let stored = Arc::new(Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            body: bytes.clone(),
        });

        (stored, Request::from_parts(parts, Full::new(bytes)))
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the collected request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Rebuilds a pipeline request from this snapshot.
    #[must_use]
    pub fn to_request(&self) -> Request {
        let mut request = http::Request::new(Full::new(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        request
    }
}

/// Runs `fut` with `request` as the current request for the calling task.
///
/// Entering and exiting are symmetric on every exit path: when `fut`
/// completes, panics, or is cancelled, the slot reverts to its prior value,
/// so nested scopes restore correctly.
pub async fn scope<F: Future>(request: SharedRequest, fut: F) -> F::Output {
    CURRENT_REQUEST.scope(request, fut).await
}

/// Returns the current request, if one is in flight in this task's scope.
#[must_use]
pub fn current() -> Option<SharedRequest> {
    CURRENT_REQUEST.try_with(Clone::clone).ok()
}

/// Returns the current request, failing if none is in flight.
///
/// The failure signals that the context-channel middleware was never
/// installed on the pipeline serving this request.
pub fn try_current() -> KernelResult<SharedRequest> {
    current().ok_or(KernelError::MissingRequestContext)
}

/// The context-channel middleware.
///
/// Snapshots the incoming request and runs the rest of the chain inside the
/// task-local scope, making the request recoverable by route-level
/// middleware. The global stack installer guarantees this stage is always
/// first in the pipeline and is installed at most once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestScopeMiddleware;

impl RequestScopeMiddleware {
    /// Creates the context-channel middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ChainMiddleware for RequestScopeMiddleware {
    fn name(&self) -> &str {
        REQUEST_SCOPE_STAGE
    }

    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let (stored, request) = StoredRequest::capture(request).await;
            scope(stored, next.run(request)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request as HttpRequest;

    fn test_request(path: &str, body: &'static str) -> Request {
        HttpRequest::builder()
            .uri(path)
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_scope_means_no_current() {
        assert!(current().is_none());
        let err = try_current().unwrap_err();
        assert!(matches!(err, KernelError::MissingRequestContext));
    }

    #[tokio::test]
    async fn test_capture_preserves_request() {
        let request = test_request("/items", "payload");
        let (stored, rebuilt) = StoredRequest::capture(request).await;

        assert_eq!(stored.uri().path(), "/items");
        assert_eq!(stored.body(), "payload");
        assert_eq!(rebuilt.uri().path(), "/items");
    }

    #[tokio::test]
    async fn test_scope_sets_and_clears() {
        let request = test_request("/scoped", "");
        let (stored, _) = StoredRequest::capture(request).await;

        scope(stored, async {
            let seen = current().expect("request should be in scope");
            assert_eq!(seen.uri().path(), "/scoped");
        })
        .await;

        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_nested_scope_restores_outer() {
        let (outer, _) = StoredRequest::capture(test_request("/outer", "")).await;
        let (inner, _) = StoredRequest::capture(test_request("/inner", "")).await;

        scope(outer, async {
            assert_eq!(current().unwrap().uri().path(), "/outer");

            scope(inner, async {
                assert_eq!(current().unwrap().uri().path(), "/inner");
            })
            .await;

            assert_eq!(current().unwrap().uri().path(), "/outer");
        })
        .await;
    }

    #[tokio::test]
    async fn test_interleaved_tasks_are_isolated() {
        async fn observe(path: &'static str) {
            let (stored, _) = StoredRequest::capture(test_request(path, "")).await;
            scope(stored, async move {
                for _ in 0..4 {
                    assert_eq!(current().unwrap().uri().path(), path);
                    tokio::task::yield_now().await;
                }
            })
            .await;
        }

        let a = tokio::spawn(observe("/a"));
        let b = tokio::spawn(observe("/b"));
        a.await.unwrap();
        b.await.unwrap();
    }

    #[tokio::test]
    async fn test_middleware_exposes_request_to_chain() {
        let mw = RequestScopeMiddleware::new();
        let next = Next::handler(|_request| {
            Box::pin(async {
                let stored = try_current().expect("scope middleware should have entered");
                http::Response::new(Full::new(stored.body().clone()))
            })
        });

        let response = mw.dispatch(test_request("/echo", "hello"), next).await;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "hello");
    }

    #[test]
    fn test_stage_name() {
        assert_eq!(RequestScopeMiddleware::new().name(), REQUEST_SCOPE_STAGE);
    }
}
