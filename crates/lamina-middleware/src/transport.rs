//! The transport-capable dispatch contract.
//!
//! Transport middleware wraps the raw connection lifecycle instead of a
//! single request/response exchange. A [`TransportHandler`] owns the whole
//! lifecycle: it reads request events from the receive channel, writes
//! response events to the send channel, and must itself invoke the wrapped
//! inner handler to continue.
//!
//! Because transport middleware has no route-granularity hook, it cannot be
//! applied at route level; the route applicator rejects it at decoration
//! time.

use crate::middleware::BoxFuture;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use lamina_core::{ConstructionArgs, KernelResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Connection-scoped metadata handed to a transport handler.
///
/// Carries the request line and headers of the exchange the connection is
/// currently serving, plus the peer address when known.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    peer_addr: Option<SocketAddr>,
}

impl ConnectionContext {
    /// Creates a new connection context.
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        version: Version,
        headers: HeaderMap,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method,
            uri,
            version,
            headers,
            peer_addr,
        }
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

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Rebuilds a pipeline request from this context and a collected body.
    #[must_use]
    pub fn to_request(&self, body: Bytes) -> lamina_core::Request {
        let mut request = http::Request::new(http_body_util::Full::new(body));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        request
    }
}

/// An event flowing over a transport channel.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A chunk of the request body; `more` is false on the final chunk.
    RequestBody {
        /// The chunk payload.
        data: Bytes,
        /// Whether further chunks follow.
        more: bool,
    },
    /// The start of the response: status and headers.
    ResponseStart {
        /// Response status code.
        status: StatusCode,
        /// Response headers.
        headers: HeaderMap,
    },
    /// A chunk of the response body; `more` is false on the final chunk.
    ResponseBody {
        /// The chunk payload.
        data: Bytes,
        /// Whether further chunks follow.
        more: bool,
    },
    /// The peer disconnected.
    Disconnect,
}

/// Channel a transport handler reads request events from.
pub type ReceiveChannel = mpsc::Receiver<TransportEvent>;

/// Channel a transport handler writes response events to.
pub type SendChannel = mpsc::Sender<TransportEvent>;

/// A handler owning the raw connection lifecycle.
///
/// Implementations built as middleware hold the inner handler they wrap and
/// must invoke it to continue the lifecycle.
pub trait TransportHandler: Send + Sync + 'static {
    /// Serves one exchange on the connection.
    fn call(
        &self,
        ctx: ConnectionContext,
        receive: ReceiveChannel,
        send: SendChannel,
    ) -> BoxFuture<'static, ()>;
}

/// Builds a transport middleware instance around an inner handler.
///
/// Construction is deferred until install time so the descriptor's
/// construction arguments can be supplied then.
pub trait TransportFactory: Send + Sync + 'static {
    /// Returns the factory's middleware name.
    fn name(&self) -> &str;

    /// Builds the transport middleware wrapping `inner`.
    fn build(
        &self,
        inner: Arc<dyn TransportHandler>,
        args: &ConstructionArgs,
    ) -> KernelResult<Arc<dyn TransportHandler>>;
}
