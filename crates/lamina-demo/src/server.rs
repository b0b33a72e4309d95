//! HTTP serving glue.
//!
//! Binds a TCP listener and drives each exchange through the application's
//! transport plane: the request is turned into connection events, the
//! wrapped transport handler runs, and the response events are folded back
//! into an HTTP response for hyper.

use crate::app::App;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response as HttpResponse, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use lamina::middleware::transport::{ConnectionContext, TransportEvent, TransportHandler};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// The demo HTTP server.
pub struct Server {
    addr: SocketAddr,
    app: Arc<App>,
}

impl Server {
    /// Creates a server for the given address and application.
    #[must_use]
    pub fn new(addr: SocketAddr, app: Arc<App>) -> Self {
        Self { addr, app }
    }

    /// Runs the accept loop until ctrl-c.
    pub async fn run(self) -> anyhow::Result<()> {
        let transport = self.app.transport()?;
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "listening");

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    return Ok(());
                }
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    continue;
                }
            };

            let transport = transport.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |request: http::Request<Incoming>| {
                    let transport = transport.clone();
                    async move {
                        Ok::<_, Infallible>(drive_exchange(transport, request, peer).await)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(error = %err, "connection error");
                }
            });
        }
    }
}

/// Drives one request through the transport plane.
async fn drive_exchange(
    transport: Arc<dyn TransportHandler>,
    request: http::Request<Incoming>,
    peer: SocketAddr,
) -> HttpResponse<Full<Bytes>> {
    let (parts, body) = request.into_parts();

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request body");
            let mut response = HttpResponse::new(Full::new(Bytes::from("bad request")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return response;
        }
    };

    let ctx = ConnectionContext::new(
        parts.method,
        parts.uri,
        parts.version,
        parts.headers,
        Some(peer),
    );

    let (event_tx, receive) = mpsc::channel(4);
    let (send, events) = mpsc::channel(4);

    let _ = event_tx
        .send(TransportEvent::RequestBody {
            data: body_bytes,
            more: false,
        })
        .await;
    drop(event_tx);

    let (_, response) = tokio::join!(
        transport.call(ctx, receive, send),
        collect_response(events)
    );
    response
}

/// Folds response events back into an HTTP response.
async fn collect_response(
    mut events: mpsc::Receiver<TransportEvent>,
) -> HttpResponse<Full<Bytes>> {
    let mut status = StatusCode::INTERNAL_SERVER_ERROR;
    let mut headers = HeaderMap::new();
    let mut body = BytesMut::new();

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::ResponseStart {
                status: s,
                headers: h,
            } => {
                status = s;
                headers = h;
            }
            TransportEvent::ResponseBody { data, more } => {
                body.extend_from_slice(&data);
                if !more {
                    break;
                }
            }
            TransportEvent::Disconnect => break,
            TransportEvent::RequestBody { .. } => {}
        }
    }

    let mut response = HttpResponse::new(Full::new(body.freeze()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
