//! # Lamina
//!
//! **Middleware registration and dispatch kernel for HTTP services**
//!
//! Lamina lets callers define middleware as plain request-handling
//! functions, trait-implementing dispatchers, or raw transport-level
//! handlers; register them under stable names or symbol paths; group them;
//! and apply them either globally (an ordered stack on every matched
//! request) or locally (attached to one specific route).
//!
//! ## Quick Start
//!
//! ```
//! use lamina::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> lamina::core::KernelResult<()> {
//! // Composition root: registry, resolver, stack.
//! let registry = Arc::new(MiddlewareRegistry::new());
//! registry.bulk_load(lamina::middleware::stages::builtin_table());
//! let resolver = Resolver::new(registry, lamina::middleware::stages::default_symbols());
//!
//! let stack = StackDefinition::new()
//!     .push(StackEntry::new(MiddlewareRef::named("request_log")).group("api"))
//!     .push(StackEntry::new(MiddlewareRef::named("gzip")).group("api"));
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.install(&stack.load(&resolver)?, Some("api"))?;
//! assert!(pipeline.has_stage("request_log"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → request_scope → stage 1 → … → stage n → Handler
//!                                                      ↓
//! Response ←──── stage 1 ←──── … ←──── stage n ←──────┘
//! ```
//!
//! The context-channel stage (`request_scope`) is always first: it makes
//! the in-flight request recoverable from task-scoped storage, which is how
//! route-level middleware finds "the current request" outside the normal
//! call chain.

#![doc(html_root_url = "https://docs.rs/lamina/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use lamina_core as core;

// Re-export the kernel
pub use lamina_middleware as middleware;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use lamina_core::{
        ConstructionArgs, KernelError, KernelResult, Request, Response, ResponseExt,
    };
    pub use lamina_middleware::{
        route, scope, ChainMiddleware, Interceptor, MiddlewareDescriptor, MiddlewareRef,
        MiddlewareRegistry, Next, Observer, Pipeline, Resolver, RouteHandlerFn, RouteInvocation,
        StackConfig, StackDefinition, StackEntry, SymbolTable,
    };
}
