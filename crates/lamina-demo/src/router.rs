//! Request routing with path parameter extraction.
//!
//! Maps method + path to a registered route handler. Path patterns use
//! `{paramName}` segments; extracted parameters travel to the handler in
//! its [`RouteInvocation`].

use http::Method;
use lamina::prelude::RouteHandlerFn;
use std::collections::HashMap;

/// A segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

/// A registered route.
#[derive(Clone)]
struct Route {
    method: Method,
    segments: Vec<PathSegment>,
    handler: RouteHandlerFn,
}

impl Route {
    fn new(method: Method, pattern: &str, handler: RouteHandlerFn) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s.starts_with('{') && s.ends_with('}') {
                    PathSegment::Param(s[1..s.len() - 1].to_string())
                } else {
                    PathSegment::Literal(s.to_string())
                }
            })
            .collect();
        Self {
            method,
            segments,
            handler,
        }
    }

    fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let actual: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if actual.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, actual) in self.segments.iter().zip(actual.iter()) {
            match pattern {
                PathSegment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(params)
    }
}

/// A router mapping requests to handlers.
///
/// Routes are checked in registration order; first match wins.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a method and path pattern.
    pub fn add_route(&mut self, method: Method, pattern: &str, handler: RouteHandlerFn) {
        self.routes.push(Route::new(method, pattern, handler));
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Matches a request to a handler and its extracted path parameters.
    #[must_use]
    pub fn match_route(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(RouteHandlerFn, HashMap<String, String>)> {
        for route in &self.routes {
            if route.method == *method {
                if let Some(params) = route.match_path(path) {
                    return Some((route.handler.clone(), params));
                }
            }
        }
        None
    }
}
