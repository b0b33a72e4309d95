//! CORS (Cross-Origin Resource Sharing) middleware.
//!
//! Handles preflight OPTIONS requests without invoking the rest of the chain
//! and adds CORS headers to ordinary responses. Registered under the name
//! `"cors"`.
//!
//! ## Example
//!
//! ```
//! use lamina_middleware::stages::cors::Cors;
//! use http::Method;
//!
//! let cors = Cors::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_credentials(true)
//!     .build();
//! ```

use crate::middleware::{BoxFuture, ChainMiddleware, Next};
use crate::resolver::ChainFactory;
use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode};
use http_body_util::Full;
use lamina_core::{ConstructionArgs, KernelResult, Request, Response, ResponseExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Origin` header.
    pub const ORIGIN: &str = "origin";
    /// `Vary` header.
    pub const VARY: &str = "vary";
}

/// The set of origins a [`Cors`] middleware accepts.
#[derive(Debug, Clone)]
pub enum OriginPolicy {
    /// Any origin (wildcard `*`).
    Any,
    /// An explicit allowlist.
    List(HashSet<String>),
}

impl OriginPolicy {
    /// Returns true if the origin is accepted.
    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin),
        }
    }

    /// Returns the `Access-Control-Allow-Origin` value for an accepted
    /// origin.
    fn header_value(&self, origin: &str) -> Option<HeaderValue> {
        match self {
            Self::Any => Some(HeaderValue::from_static("*")),
            Self::List(origins) => {
                if origins.contains(origin) {
                    HeaderValue::from_str(origin).ok()
                } else {
                    None
                }
            }
        }
    }
}

/// Construction arguments accepted by the `"cors"` factory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct CorsArgs {
    allow_any_origin: bool,
    allow_origins: Vec<String>,
    allow_methods: Vec<String>,
    allow_headers: Vec<String>,
    allow_credentials: bool,
    max_age_secs: Option<u64>,
}

impl Default for CorsArgs {
    fn default() -> Self {
        Self {
            allow_any_origin: false,
            allow_origins: Vec::new(),
            allow_methods: vec![
                "GET".to_string(),
                "HEAD".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "DELETE".to_string(),
                "PATCH".to_string(),
            ],
            allow_headers: vec!["content-type".to_string(), "authorization".to_string()],
            allow_credentials: false,
            max_age_secs: Some(86_400),
        }
    }
}

/// Builds `"cors"` middleware instances from construction arguments.
pub struct CorsFactory;

impl ChainFactory for CorsFactory {
    fn name(&self) -> &str {
        "cors"
    }

    fn build(&self, args: &ConstructionArgs) -> KernelResult<Arc<dyn ChainMiddleware>> {
        let args: CorsArgs = args.deserialize()?;

        let mut builder = Cors::builder()
            .allow_headers(args.allow_headers)
            .allow_credentials(args.allow_credentials);

        if args.allow_any_origin {
            builder = builder.allow_any_origin();
        } else {
            builder = builder.allow_origins(args.allow_origins);
        }

        let methods = args
            .allow_methods
            .iter()
            .filter_map(|m| m.parse::<Method>().ok());
        builder = builder.allow_methods(methods);

        if let Some(secs) = args.max_age_secs {
            builder = builder.max_age(Duration::from_secs(secs));
        }

        Ok(Arc::new(builder.build()))
    }
}

/// CORS middleware.
///
/// Preflight requests short-circuit the chain; ordinary requests pass
/// through and have CORS headers appended to the response when the origin
/// is accepted.
#[derive(Debug, Clone)]
pub struct Cors {
    origins: OriginPolicy,
    methods: HashSet<Method>,
    allowed_headers: HashSet<String>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

/// Builder for [`Cors`].
#[derive(Debug, Clone)]
pub struct CorsBuilder {
    cors: Cors,
}

impl Default for CorsBuilder {
    fn default() -> Self {
        Self {
            cors: Cors {
                origins: OriginPolicy::List(HashSet::new()),
                methods: HashSet::from([
                    Method::GET,
                    Method::HEAD,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::PATCH,
                ]),
                allowed_headers: HashSet::from([
                    "content-type".to_string(),
                    "authorization".to_string(),
                ]),
                allow_credentials: false,
                max_age: Some(Duration::from_secs(86_400)),
            },
        }
    }
}

impl CorsBuilder {
    /// Accepts any origin.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.cors.origins = OriginPolicy::Any;
        self
    }

    /// Adds one accepted origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        if let OriginPolicy::List(origins) = &mut self.cors.origins {
            origins.insert(origin.into());
        }
        self
    }

    /// Replaces the accepted origins.
    #[must_use]
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors.origins = OriginPolicy::List(origins.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the accepted methods.
    #[must_use]
    pub fn allow_methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.cors.methods = methods.into_iter().collect();
        self
    }

    /// Replaces the accepted request headers.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cors.allowed_headers = headers
            .into_iter()
            .map(|h| h.into().to_lowercase())
            .collect();
        self
    }

    /// Sets whether credentialed requests are accepted.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.cors.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache duration.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.cors.max_age = Some(max_age);
        self
    }

    /// Builds the middleware.
    #[must_use]
    pub fn build(self) -> Cors {
        self.cors
    }
}

impl Cors {
    /// Creates a builder with conventional defaults.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::default()
    }

    /// Creates a permissive instance accepting any origin. Development only.
    #[must_use]
    pub fn permissive() -> Self {
        Self::builder().allow_any_origin().build()
    }

    fn is_preflight(request: &Request) -> bool {
        request.method() == Method::OPTIONS
            && request.headers().contains_key(headers::ORIGIN)
            && request.headers().contains_key(headers::REQUEST_METHOD)
    }

    fn origin_of(request: &Request) -> Option<String> {
        request
            .headers()
            .get(headers::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    fn handle_preflight(&self, request: &Request) -> Response {
        let Some(origin) = Self::origin_of(request) else {
            return Response::error(StatusCode::FORBIDDEN, "missing Origin header");
        };
        if !self.origins.allows(&origin) {
            return Response::error(StatusCode::FORBIDDEN, "origin not allowed");
        }

        if let Some(requested) = request
            .headers()
            .get(headers::REQUEST_METHOD)
            .and_then(|v| v.to_str().ok())
            .and_then(|m| m.parse::<Method>().ok())
        {
            if !self.methods.contains(&requested) {
                return Response::error(StatusCode::FORBIDDEN, "method not allowed");
            }
        }

        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;
        let response_headers = response.headers_mut();

        if let Some(value) = self.origins.header_value(&origin) {
            response_headers.insert(headers::ALLOW_ORIGIN, value);
        }

        let methods: Vec<_> = self.methods.iter().map(Method::as_str).collect();
        if let Ok(value) = HeaderValue::from_str(&methods.join(", ")) {
            response_headers.insert(headers::ALLOW_METHODS, value);
        }

        let allowed: Vec<_> = self.allowed_headers.iter().cloned().collect();
        if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
            response_headers.insert(headers::ALLOW_HEADERS, value);
        }

        if self.allow_credentials {
            response_headers.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }

        if let Some(max_age) = self.max_age {
            if let Ok(value) = HeaderValue::from_str(&max_age.as_secs().to_string()) {
                response_headers.insert(headers::MAX_AGE, value);
            }
        }

        response_headers.insert(
            headers::VARY,
            HeaderValue::from_static("Origin, Access-Control-Request-Method"),
        );

        response
    }

    fn append_headers(&self, response: &mut Response, origin: &str) {
        let response_headers = response.headers_mut();
        if let Some(value) = self.origins.header_value(origin) {
            response_headers.insert(headers::ALLOW_ORIGIN, value);
        }
        if self.allow_credentials {
            response_headers.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        response_headers.insert(headers::VARY, HeaderValue::from_static("Origin"));
    }
}

impl ChainMiddleware for Cors {
    fn name(&self) -> &str {
        "cors"
    }

    fn dispatch<'a>(&'a self, request: Request, next: Next) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if Self::is_preflight(&request) {
                return self.handle_preflight(&request);
            }

            let origin = Self::origin_of(&request);
            let mut response = next.run(request).await;

            if let Some(origin) = origin {
                if self.origins.allows(&origin) {
                    self.append_headers(&mut response, &origin);
                }
            }

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request as HttpRequest;
    use serde_json::json;

    fn preflight(origin: &str, method: &str) -> Request {
        HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri("/test")
            .header(headers::ORIGIN, origin)
            .header(headers::REQUEST_METHOD, method)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn with_origin(origin: &str) -> Request {
        HttpRequest::builder()
            .uri("/test")
            .header(headers::ORIGIN, origin)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn ok_next() -> Next {
        Next::handler(|_req| {
            Box::pin(async {
                http::Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::from("OK")))
                    .unwrap()
            })
        })
    }

    #[tokio::test]
    async fn test_preflight_allowed_origin() {
        let cors = Cors::builder()
            .allow_origin("https://app.example.com")
            .build();

        let response = cors
            .dispatch(preflight("https://app.example.com", "POST"), ok_next())
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(headers::ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_preflight_rejected_origin() {
        let cors = Cors::builder()
            .allow_origin("https://app.example.com")
            .build();

        let response = cors
            .dispatch(preflight("https://evil.example.com", "POST"), ok_next())
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_preflight_rejected_method() {
        let cors = Cors::builder()
            .allow_origin("https://app.example.com")
            .allow_methods([Method::GET])
            .build();

        let response = cors
            .dispatch(preflight("https://app.example.com", "DELETE"), ok_next())
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_regular_request_gets_headers() {
        let cors = Cors::builder()
            .allow_origin("https://app.example.com")
            .allow_credentials(true)
            .build();

        let response = cors
            .dispatch(with_origin("https://app.example.com"), ok_next())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(headers::ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
        assert_eq!(
            response.headers().get(headers::ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_disallowed_origin_passes_without_headers() {
        let cors = Cors::builder()
            .allow_origin("https://app.example.com")
            .build();

        let response = cors
            .dispatch(with_origin("https://evil.example.com"), ok_next())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(headers::ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_permissive_allows_anything() {
        let cors = Cors::permissive();
        let response = cors
            .dispatch(with_origin("https://anywhere.example"), ok_next())
            .await;
        assert_eq!(response.headers().get(headers::ALLOW_ORIGIN).unwrap(), "*");
    }

    #[test]
    fn test_factory_builds_from_args() {
        let mut args = ConstructionArgs::new();
        args.insert("allow_origins", json!(["https://app.example.com"]));
        args.insert("allow_credentials", json!(true));

        let middleware = CorsFactory.build(&args).unwrap();
        assert_eq!(middleware.name(), "cors");
    }

    #[test]
    fn test_factory_rejects_malformed_args() {
        let mut args = ConstructionArgs::new();
        args.insert("allow_origins", json!("not-a-list"));

        let err = CorsFactory.build(&args).err().unwrap();
        assert_eq!(err.code(), "invalid_middleware_type");
    }

    #[test]
    fn test_factory_default_args() {
        let middleware = CorsFactory.build(&ConstructionArgs::new()).unwrap();
        assert_eq!(middleware.name(), "cors");
    }
}
