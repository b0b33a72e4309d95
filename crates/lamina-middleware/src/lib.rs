//! # Lamina Middleware
//!
//! The middleware resolution and composition kernel.
//!
//! Lamina normalizes three heterogeneous middleware shapes into one uniform
//! dispatch contract:
//!
//! - **functions** - full interceptors taking a continuation, or
//!   side-effect-only observers ([`Interceptor`], [`Observer`])
//! - **trait dispatchers** - types implementing [`ChainMiddleware`]
//! - **raw transport handlers** - types implementing
//!   [`transport::TransportHandler`], wrapping the whole connection
//!   lifecycle
//!
//! ```text
//! Request → request_scope → stage 1 → … → stage n → Handler
//!                                                      ↓
//! Response ←──── stage 1 ←──── … ←──── stage n ←──────┘
//! ```
//!
//! Middleware is registered under stable names in a [`MiddlewareRegistry`]
//! or under build-time-known paths in a [`SymbolTable`], resolved by the
//! [`Resolver`], described by immutable [`MiddlewareDescriptor`]s, and
//! applied either globally ([`Pipeline::install`]) or per-route
//! ([`route::apply`]).
//!
//! The context-channel middleware ([`RequestScopeMiddleware`]) is always the
//! first installed stage: it makes the in-flight request recoverable from
//! task-scoped storage, which is how route-level middleware finds "the
//! current request" outside the normal call chain.

#![doc(html_root_url = "https://docs.rs/lamina-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod descriptor;
pub mod middleware;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod route;
pub mod scope;
pub mod stages;
pub mod transport;

// Re-export main types at crate root
pub use config::{StackConfig, StackEntryConfig};
pub use descriptor::{MiddlewareDescriptor, StackDefinition, StackEntry};
pub use middleware::{BoxFuture, ChainMiddleware, Interceptor, Next, Observer};
pub use pipeline::Pipeline;
pub use registry::MiddlewareRegistry;
pub use resolver::{ChainFactory, MiddlewareRef, ResolvedMiddleware, Resolver, SymbolTable};
pub use route::{RouteHandlerFn, RouteInvocation};
pub use scope::{RequestScopeMiddleware, SharedRequest, StoredRequest, REQUEST_SCOPE_STAGE};
pub use transport::{
    ConnectionContext, ReceiveChannel, SendChannel, TransportEvent, TransportFactory,
    TransportHandler,
};
