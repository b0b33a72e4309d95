//! Gzip response compression middleware.
//!
//! Compresses response bodies when the client's `Accept-Encoding` admits
//! gzip, the content type is compressible, and the body clears a minimum
//! size threshold. Registered under the name `"gzip"`.

use crate::middleware::{BoxFuture, ChainMiddleware, Next};
use crate::resolver::ChainFactory;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http::header;
use http_body_util::{BodyExt, Full};
use lamina_core::{ConstructionArgs, KernelResult, Request, Response};
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;

/// Construction arguments accepted by the `"gzip"` factory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct CompressionArgs {
    min_size: usize,
    level: u32,
}

impl Default for CompressionArgs {
    fn default() -> Self {
        Self {
            min_size: 1024,
            level: 6,
        }
    }
}

/// Builds `"gzip"` middleware instances from construction arguments.
pub struct CompressionFactory;

impl ChainFactory for CompressionFactory {
    fn name(&self) -> &str {
        "gzip"
    }

    fn build(&self, args: &ConstructionArgs) -> KernelResult<Arc<dyn ChainMiddleware>> {
        let args: CompressionArgs = args.deserialize()?;
        Ok(Arc::new(Gzip {
            min_size: args.min_size,
            level: Compression::new(args.level.min(9)),
        }))
    }
}

/// Gzip compression middleware.
///
/// Reads `Accept-Encoding` from the request; on compression it sets
/// `Content-Encoding: gzip`, drops `Content-Length`, and always appends
/// `Vary: Accept-Encoding`.
#[derive(Debug, Clone)]
pub struct Gzip {
    min_size: usize,
    level: Compression,
}

impl Default for Gzip {
    fn default() -> Self {
        Self {
            min_size: 1024,
            level: Compression::default(),
        }
    }
}

impl Gzip {
    /// Creates the middleware with default settings (1 KiB threshold).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the middleware with a custom minimum size threshold.
    #[must_use]
    pub fn with_min_size(min_size: usize) -> Self {
        Self {
            min_size,
            ..Self::default()
        }
    }

    fn client_accepts_gzip(request: &Request) -> bool {
        request
            .headers()
            .get(header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |accept| {
                accept.split(',').any(|part| {
                    let mut pieces = part.trim().split(';');
                    let encoding = pieces.next().unwrap_or_default().trim();
                    let disabled = pieces
                        .any(|param| param.trim() == "q=0" || param.trim() == "q=0.0");
                    encoding.eq_ignore_ascii_case("gzip") && !disabled
                })
            })
    }

    fn compressible_content_type(response: &Response) -> bool {
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let base = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        base.starts_with("text/")
            || base == "application/json"
            || base == "application/javascript"
            || base == "application/xml"
            || base == "image/svg+xml"
    }

    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }
}

impl ChainMiddleware for Gzip {
    fn name(&self) -> &str {
        "gzip"
    }

    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let accepts_gzip = Self::client_accepts_gzip(&request);

            let mut response = next.run(request).await;
            response.headers_mut().append(
                header::VARY,
                http::HeaderValue::from_static("Accept-Encoding"),
            );

            let already_encoded = response.headers().contains_key(header::CONTENT_ENCODING);
            if !accepts_gzip || already_encoded || !Self::compressible_content_type(&response) {
                return response;
            }

            let (parts, body) = response.into_parts();
            let body_bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            if body_bytes.len() < self.min_size {
                return Response::from_parts(parts, Full::new(body_bytes));
            }

            let compressed = match self.compress(&body_bytes) {
                Ok(data) if data.len() < body_bytes.len() => data,
                // Compression failed or did not help; send the original.
                _ => return Response::from_parts(parts, Full::new(body_bytes)),
            };

            let mut response = Response::from_parts(parts, Full::new(Bytes::from(compressed)));
            response.headers_mut().insert(
                header::CONTENT_ENCODING,
                http::HeaderValue::from_static("gzip"),
            );
            response.headers_mut().remove(header::CONTENT_LENGTH);
            response
        })
    }
}
