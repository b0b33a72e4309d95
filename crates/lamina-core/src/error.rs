//! Error types for the middleware kernel.
//!
//! All kernel errors are programmer or configuration errors: they are raised
//! synchronously at resolution, installation, or decoration time wherever
//! possible, and are never retried. The one exception is
//! [`KernelError::MissingRequestContext`], which can only be detected at
//! request time because it depends on how the pipeline was composed.
//!
//! Application-level failures inside a middleware's own dispatch logic are
//! opaque to the kernel: they surface as the chain's response and are not
//! represented here.

use crate::types::{Response, ResponseExt};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`KernelError`].
pub type KernelResult<T> = Result<T, KernelError>;

/// Why a path reference failed to resolve against the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportErrorKind {
    /// No symbol under the path's module prefix is registered.
    UnknownModule,
    /// The module prefix is known but the trailing symbol is not.
    UnknownSymbol,
}

impl std::fmt::Display for ImportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModule => write!(f, "unknown module"),
            Self::UnknownSymbol => write!(f, "unknown symbol"),
        }
    }
}

/// Standard error type for the middleware kernel.
///
/// # Example
///
/// ```
/// use lamina_core::KernelError;
///
/// let err = KernelError::UnknownMiddlewareName { name: "nope".to_string() };
/// assert_eq!(err.code(), "unknown_middleware_name");
/// ```
#[derive(Error, Debug)]
pub enum KernelError {
    /// A name was looked up in the registry but was never registered.
    #[error("unknown middleware name: {name:?}")]
    UnknownMiddlewareName {
        /// The name that failed to resolve.
        name: String,
    },

    /// A path reference could not be resolved against the symbol table.
    #[error("cannot resolve middleware path {path:?}: {kind}")]
    ImportResolution {
        /// The path that failed to resolve.
        path: String,
        /// Whether the module or the symbol was unknown.
        kind: ImportErrorKind,
    },

    /// A reference resolved to something that is not a valid middleware,
    /// or a middleware could not be constructed from its arguments.
    #[error("invalid middleware type: {detail}")]
    InvalidMiddlewareType {
        /// Description of the offending value and its observed shape.
        detail: String,
    },

    /// A registry name is already bound and override was not requested.
    #[error("middleware name {name:?} is already registered")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// No request is observable in the current task scope.
    ///
    /// Raised at request time when a route-level middleware runs on a route
    /// that the context-channel middleware never wrapped.
    #[error("no request is in flight in the current task scope")]
    MissingRequestContext,

    /// A transport-capable middleware was applied to a single route.
    ///
    /// Transport middleware wraps the whole connection lifecycle and has no
    /// route-granularity hook.
    #[error("transport middleware {name:?} cannot be applied to a single route")]
    TransportNotRouteApplicable {
        /// The offending middleware's name.
        name: String,
    },
}

impl KernelError {
    /// Returns the stable machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownMiddlewareName { .. } => "unknown_middleware_name",
            Self::ImportResolution { .. } => "import_resolution",
            Self::InvalidMiddlewareType { .. } => "invalid_middleware_type",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::MissingRequestContext => "missing_request_context",
            Self::TransportNotRouteApplicable { .. } => "transport_not_route_applicable",
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// Kernel errors are configuration faults, so every variant maps to a
    /// server-side status.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Converts this error into a JSON error response envelope.
    #[must_use]
    pub fn to_response(&self) -> Response {
        Response::json_error(self.status_code(), self.code(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = KernelError::DuplicateName {
            name: "cors".to_string(),
        };
        assert_eq!(err.code(), "duplicate_name");

        let err = KernelError::MissingRequestContext;
        assert_eq!(err.code(), "missing_request_context");
    }

    #[test]
    fn test_import_resolution_display() {
        let err = KernelError::ImportResolution {
            path: "nowhere::Thing".to_string(),
            kind: ImportErrorKind::UnknownModule,
        };
        let message = err.to_string();
        assert!(message.contains("nowhere::Thing"));
        assert!(message.contains("unknown module"));
    }

    #[test]
    fn test_to_response_envelope() {
        let err = KernelError::UnknownMiddlewareName {
            name: "nope".to_string(),
        };
        let response = err.to_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_invalid_middleware_type_names_offender() {
        let err = KernelError::InvalidMiddlewareType {
            detail: "reference \"cors\" resolved to a name cycle".to_string(),
        };
        assert!(err.to_string().contains("name cycle"));
    }
}
