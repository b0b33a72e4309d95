//! Trusted-host middleware.
//!
//! Rejects requests whose `Host` header is not in the configured allowlist
//! with `400 Bad Request`, before the rest of the chain runs. Patterns may
//! start with `*.` to accept any subdomain of a suffix. Registered under the
//! name `"trusted_host"`.

use crate::middleware::{BoxFuture, ChainMiddleware, Next};
use crate::resolver::ChainFactory;
use http::{header, StatusCode};
use lamina_core::{ConstructionArgs, KernelResult, Request, Response, ResponseExt};
use serde::Deserialize;
use std::sync::Arc;

/// Construction arguments accepted by the `"trusted_host"` factory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct TrustedHostArgs {
    allowed_hosts: Vec<String>,
}

/// Builds `"trusted_host"` middleware instances from construction arguments.
pub struct TrustedHostFactory;

impl ChainFactory for TrustedHostFactory {
    fn name(&self) -> &str {
        "trusted_host"
    }

    fn build(&self, args: &ConstructionArgs) -> KernelResult<Arc<dyn ChainMiddleware>> {
        let args: TrustedHostArgs = args.deserialize()?;
        Ok(Arc::new(TrustedHost::new(args.allowed_hosts)))
    }
}

/// Host-header allowlist middleware.
///
/// # Example
///
/// ```
/// use lamina_middleware::stages::trusted_host::TrustedHost;
///
/// let mw = TrustedHost::new(["example.com", "*.example.com"]);
/// assert!(mw.is_trusted("example.com"));
/// assert!(mw.is_trusted("api.example.com"));
/// assert!(!mw.is_trusted("evil.test"));
/// ```
#[derive(Debug, Clone)]
pub struct TrustedHost {
    patterns: Vec<String>,
}

impl TrustedHost {
    /// Creates the middleware from host patterns.
    ///
    /// An empty pattern list trusts nothing; a lone `"*"` trusts everything.
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    /// Returns true if the host matches the allowlist.
    #[must_use]
    pub fn is_trusted(&self, host: &str) -> bool {
        // The Host header may carry a port.
        let host = host.split(':').next().unwrap_or(host).to_lowercase();

        self.patterns.iter().any(|pattern| {
            if pattern == "*" {
                true
            } else if let Some(suffix) = pattern.strip_prefix("*.") {
                host.strip_suffix(suffix)
                    .map_or(false, |head| head.ends_with('.'))
            } else {
                host == *pattern
            }
        })
    }
}

impl ChainMiddleware for TrustedHost {
    fn name(&self) -> &str {
        "trusted_host"
    }

    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let host = request
                .headers()
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            if !self.is_trusted(host) {
                tracing::warn!(host, "rejecting request from untrusted host");
                return Response::error(StatusCode::BAD_REQUEST, "invalid host header");
            }

            next.run(request).await
        })
    }
}
