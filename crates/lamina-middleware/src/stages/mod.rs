//! Bundled middleware stages.
//!
//! These stages are consumers of the kernel, not part of it: each one enters
//! the pipeline through the same registration mechanism available to
//! application middleware. [`builtin_table`] is the static name table merged
//! into the registry at startup, and [`default_symbols`] is the
//! build-time-known symbol table for path references.

pub mod compression;
pub mod cors;
pub mod header_tag;
pub mod request_log;
pub mod transport_log;
pub mod trusted_host;

use crate::resolver::{MiddlewareRef, ResolvedMiddleware, SymbolTable};
use std::sync::Arc;

/// The symbol path of the transport logging middleware.
pub const TRANSPORT_LOG_PATH: &str = "lamina_middleware::stages::transport_log::TransportLog";

/// The symbol path of the CORS middleware.
pub const CORS_PATH: &str = "lamina_middleware::stages::cors::Cors";

/// The static table of built-in middleware names.
///
/// Merged into the registry with override semantics at process start, so a
/// repeated load never errors.
#[must_use]
pub fn builtin_table() -> Vec<(&'static str, MiddlewareRef)> {
    vec![
        ("cors", MiddlewareRef::chain(Arc::new(cors::CorsFactory))),
        (
            "gzip",
            MiddlewareRef::chain(Arc::new(compression::CompressionFactory)),
        ),
        (
            "trusted_host",
            MiddlewareRef::chain(Arc::new(trusted_host::TrustedHostFactory)),
        ),
        (
            "request_log",
            MiddlewareRef::chain(Arc::new(request_log::RequestLogFactory)),
        ),
        (
            "header_tag",
            MiddlewareRef::chain(Arc::new(header_tag::HeaderTagFactory)),
        ),
        ("transport_log", MiddlewareRef::path(TRANSPORT_LOG_PATH)),
    ]
}

/// The build-time-known symbol table for the bundled stages.
#[must_use]
pub fn default_symbols() -> SymbolTable {
    let mut symbols = SymbolTable::new();
    symbols.register(
        TRANSPORT_LOG_PATH,
        ResolvedMiddleware::Transport(Arc::new(transport_log::TransportLogFactory)),
    );
    symbols.register(
        CORS_PATH,
        ResolvedMiddleware::Chain(Arc::new(cors::CorsFactory)),
    );
    symbols
}
