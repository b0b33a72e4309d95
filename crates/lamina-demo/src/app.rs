//! The application surface: routes plus the installed pipeline.
//!
//! [`App`] is the host-framework seam the kernel composes against: an
//! ordered middleware-installation API, a route-registration surface that
//! accepts decorator-wrapped handlers, and a dispatch path that hands the
//! uniform request to every chain stage.

use crate::router::Router;
use bytes::BytesMut;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use lamina::middleware::transport::{
    ConnectionContext, ReceiveChannel, SendChannel, TransportEvent, TransportHandler,
};
use lamina::middleware::{BoxFuture, MiddlewareDescriptor, Pipeline};
use lamina::prelude::{KernelResult, Request, Response, ResponseExt, RouteHandlerFn, RouteInvocation};
use std::sync::Arc;

/// An application: a router behind an installed middleware pipeline.
#[derive(Default)]
pub struct App {
    router: Router,
    pipeline: Pipeline,
}

impl App {
    /// Creates an empty application.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a loaded middleware stack, optionally filtered by group.
    pub fn install(
        &mut self,
        descriptors: &[MiddlewareDescriptor],
        group: Option<&str>,
    ) -> KernelResult<()> {
        self.pipeline.install(descriptors, group)
    }

    /// Registers a route handler.
    pub fn route(&mut self, method: Method, pattern: &str, handler: RouteHandlerFn) {
        self.router.add_route(method, pattern, handler);
    }

    /// Returns the installed pipeline's stage names, in invocation order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.pipeline.stage_names()
    }

    /// Serves one request through the chain plane and the router.
    pub async fn handle(&self, request: Request) -> Response {
        let router = self.router.clone();
        self.pipeline
            .process(request, move |request| {
                Box::pin(async move { dispatch(router, request).await })
            })
            .await
    }

    /// Folds the transport plane around this application's dispatch path.
    pub fn transport(self: &Arc<Self>) -> KernelResult<Arc<dyn TransportHandler>> {
        self.pipeline
            .wrap_transport(Arc::new(DispatchHandler { app: self.clone() }))
    }
}

/// Terminal route dispatch, after the chain plane has run.
async fn dispatch(router: Router, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some((handler, params)) = router.match_route(&method, &path) else {
        return Response::json_error(StatusCode::NOT_FOUND, "not_found", "no route matches");
    };

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };

    match handler(RouteInvocation::new(params, body)).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, %method, path = %path, "route handler failed");
            err.to_response()
        }
    }
}

/// The innermost transport handler: bridges connection events into the
/// request/response dispatch path.
struct DispatchHandler {
    app: Arc<App>,
}

impl TransportHandler for DispatchHandler {
    fn call(
        &self,
        ctx: ConnectionContext,
        mut receive: ReceiveChannel,
        send: SendChannel,
    ) -> BoxFuture<'static, ()> {
        let app = self.app.clone();
        Box::pin(async move {
            let mut body = BytesMut::new();
            while let Some(event) = receive.recv().await {
                match event {
                    TransportEvent::RequestBody { data, more } => {
                        body.extend_from_slice(&data);
                        if !more {
                            break;
                        }
                    }
                    TransportEvent::Disconnect => return,
                    TransportEvent::ResponseStart { .. } | TransportEvent::ResponseBody { .. } => {}
                }
            }

            let request = ctx.to_request(body.freeze());
            let response = app.handle(request).await;

            let (parts, body) = response.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            let _ = send
                .send(TransportEvent::ResponseStart {
                    status: parts.status,
                    headers: parts.headers,
                })
                .await;
            let _ = send
                .send(TransportEvent::ResponseBody {
                    data: bytes,
                    more: false,
                })
                .await;
        })
    }
}
