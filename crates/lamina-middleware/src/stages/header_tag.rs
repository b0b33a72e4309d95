//! Header-tagging middleware.
//!
//! Reads a token from a configurable request header and logs it under a
//! configurable tag, then continues. Demonstrates construction arguments
//! flowing from the descriptor into the instance at install time.
//! Registered under the name `"header_tag"`.

use crate::middleware::{BoxFuture, ChainMiddleware, Next};
use crate::resolver::ChainFactory;
use lamina_core::{ConstructionArgs, KernelResult, Request, Response};
use serde::Deserialize;
use std::sync::Arc;

/// Construction arguments accepted by the `"header_tag"` factory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct HeaderTagArgs {
    header: String,
    tag: String,
}

impl Default for HeaderTagArgs {
    fn default() -> Self {
        Self {
            header: "x-lamina-token".to_string(),
            tag: "default".to_string(),
        }
    }
}

/// Builds `"header_tag"` middleware instances from construction arguments.
pub struct HeaderTagFactory;

impl ChainFactory for HeaderTagFactory {
    fn name(&self) -> &str {
        "header_tag"
    }

    fn build(&self, args: &ConstructionArgs) -> KernelResult<Arc<dyn ChainMiddleware>> {
        let args: HeaderTagArgs = args.deserialize()?;
        Ok(Arc::new(HeaderTag {
            header: args.header,
            tag: args.tag,
        }))
    }
}

/// Logs a request header's value under a tag, then continues.
#[derive(Debug, Clone)]
pub struct HeaderTag {
    header: String,
    tag: String,
}

impl HeaderTag {
    /// Creates the middleware for the given header and tag.
    #[must_use]
    pub fn new(header: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            tag: tag.into(),
        }
    }

    /// Returns the configured tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl ChainMiddleware for HeaderTag {
    fn name(&self) -> &str {
        "header_tag"
    }

    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let token = request
                .headers()
                .get(self.header.as_str())
                .and_then(|v| v.to_str().ok())
                .unwrap_or("no-token");
            tracing::debug!(tag = %self.tag, token, "tagged request");

            next.run(request).await
        })
    }
}
