//! Common HTTP types used throughout the middleware kernel.
//!
//! Every chain-capable middleware receives the same [`Request`] type and
//! produces the same [`Response`] type, regardless of how the middleware
//! itself was defined or registered.

use bytes::Bytes;
use http_body_util::Full;

/// The HTTP request type threaded through the middleware chain.
///
/// A standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by the middleware chain.
///
/// A standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building common responses.
pub trait ResponseExt {
    /// Creates a plain-text response with the given status code and message.
    fn error(status: http::StatusCode, message: &str) -> Response;

    /// Creates a JSON error response with a structured envelope.
    fn json_error(status: http::StatusCode, code: &str, message: &str) -> Response;

    /// Creates a JSON response from a `serde_json` value.
    fn json(status: http::StatusCode, value: &serde_json::Value) -> Response;
}

impl ResponseExt for Response {
    fn error(status: http::StatusCode, message: &str) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(message.to_string())));
        *response.status_mut() = status;
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    fn json_error(status: http::StatusCode, code: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        Self::json(status, &body)
    }

    fn json(status: http::StatusCode, value: &serde_json::Value) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(value.to_string())));
        *response.status_mut() = status;
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        response
    }
}
