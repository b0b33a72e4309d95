//! Middleware reference resolution.
//!
//! A [`MiddlewareRef`] names a middleware in one of four ways: a registered
//! name, a symbol path, a chain factory, or a transport factory. The
//! [`Resolver`] normalizes every shape into a [`ResolvedMiddleware`] with
//! exactly two variants, decided once by explicit tagging rather than by
//! runtime shape inspection.
//!
//! Path references resolve against a [`SymbolTable`] populated at startup
//! with build-time-known symbols; resolution is memoized per path string, so
//! repeated resolution of the same path is cheap and structurally identical.

use crate::middleware::{ChainMiddleware, Interceptor, Next, Observer};
use crate::registry::MiddlewareRegistry;
use crate::transport::TransportFactory;
use lamina_core::{ConstructionArgs, ImportErrorKind, KernelError, KernelResult, Request, Response};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// How far a chain of `Named` references is followed before the resolver
/// reports a cycle.
const MAX_NAME_DEPTH: usize = 8;

/// Builds a chain middleware instance from captured construction arguments.
///
/// Construction is deferred until install or apply time so the descriptor's
/// arguments can be supplied then.
pub trait ChainFactory: Send + Sync + 'static {
    /// Returns the factory's middleware name.
    fn name(&self) -> &str;

    /// Builds a middleware instance with the given arguments.
    fn build(&self, args: &ConstructionArgs) -> KernelResult<Arc<dyn ChainMiddleware>>;
}

/// A factory wrapping an already-built middleware instance.
///
/// Ignores construction arguments; used for function middlewares whose
/// configuration is captured in the closure itself.
struct InstanceFactory {
    inner: Arc<dyn ChainMiddleware>,
}

impl ChainFactory for InstanceFactory {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn build(&self, _args: &ConstructionArgs) -> KernelResult<Arc<dyn ChainMiddleware>> {
        Ok(self.inner.clone())
    }
}

/// A reference to a middleware, resolvable into a canonical form.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// A name registered in the [`MiddlewareRegistry`].
    Named(String),
    /// A `module::Symbol` path registered in the [`SymbolTable`].
    Path(String),
    /// A chain-capable factory supplied directly.
    Chain(Arc<dyn ChainFactory>),
    /// A transport-capable factory supplied directly.
    Transport(Arc<dyn TransportFactory>),
}

impl MiddlewareRef {
    /// References a middleware by registered name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// References a middleware by symbol path.
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// References an already-built chain middleware instance.
    pub fn instance(middleware: Arc<dyn ChainMiddleware>) -> Self {
        Self::Chain(Arc::new(InstanceFactory { inner: middleware }))
    }

    /// References a full interceptor function.
    ///
    /// The function receives the request and the continuation; not calling
    /// the continuation short-circuits the chain.
    pub fn interceptor<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self::instance(Arc::new(Interceptor::new(name, func)))
    }

    /// References a side-effect-only observer function.
    ///
    /// The continuation is invoked unconditionally after the function runs.
    pub fn observer<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Request) -> crate::middleware::BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self::instance(Arc::new(Observer::new(name, func)))
    }

    /// References a chain factory directly.
    pub fn chain(factory: Arc<dyn ChainFactory>) -> Self {
        Self::Chain(factory)
    }

    /// References a transport factory directly.
    pub fn transport(factory: Arc<dyn TransportFactory>) -> Self {
        Self::Transport(factory)
    }
}

impl std::fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Chain(factory) => f.debug_tuple("Chain").field(&factory.name()).finish(),
            Self::Transport(factory) => f.debug_tuple("Transport").field(&factory.name()).finish(),
        }
    }
}

/// A middleware reference resolved to one of the two canonical forms.
///
/// The variants are mutually exclusive: a middleware is either chain-capable
/// or transport-capable, never ambiguous, and only chain-capable middleware
/// is addressable at route level.
#[derive(Clone)]
pub enum ResolvedMiddleware {
    /// Chain-capable: constructible with arguments, route-addressable.
    Chain(Arc<dyn ChainFactory>),
    /// Transport-capable: wraps the raw connection lifecycle.
    Transport(Arc<dyn TransportFactory>),
}

impl ResolvedMiddleware {
    /// Returns the middleware's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Chain(factory) => factory.name(),
            Self::Transport(factory) => factory.name(),
        }
    }

    /// Returns true for the chain-capable form.
    #[must_use]
    pub fn is_chain(&self) -> bool {
        matches!(self, Self::Chain(_))
    }

    /// Returns true for the transport-capable form.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl std::fmt::Debug for ResolvedMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chain(factory) => f.debug_tuple("Chain").field(&factory.name()).finish(),
            Self::Transport(factory) => f.debug_tuple("Transport").field(&factory.name()).finish(),
        }
    }
}

/// A build-time-known table of `module::Symbol` paths.
///
/// Replaces arbitrary runtime symbol lookup: a path only resolves if it was
/// registered at startup. Unknown module prefixes and unknown symbols under
/// a known module are reported distinctly.
#[derive(Default, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, ResolvedMiddleware>,
}

impl SymbolTable {
    /// Creates an empty symbol table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a symbol under its `module::Symbol` path.
    pub fn register(&mut self, path: impl Into<String>, resolved: ResolvedMiddleware) -> &mut Self {
        self.symbols.insert(path.into(), resolved);
        self
    }

    /// Looks up a path, reporting why it failed when absent.
    pub fn lookup(&self, path: &str) -> KernelResult<ResolvedMiddleware> {
        if let Some(resolved) = self.symbols.get(path) {
            return Ok(resolved.clone());
        }

        let module = path.rsplit_once("::").map(|(module, _)| module);
        let module_known = module.is_some_and(|module| {
            self.symbols
                .keys()
                .any(|key| key.rsplit_once("::").is_some_and(|(known, _)| known == module))
        });

        Err(KernelError::ImportResolution {
            path: path.to_string(),
            kind: if module_known {
                ImportErrorKind::UnknownSymbol
            } else {
                ImportErrorKind::UnknownModule
            },
        })
    }

    /// Returns the number of registered symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if no symbols are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Resolves middleware references into their canonical forms.
///
/// Resolution is deterministic and idempotent: resolving the same reference
/// twice yields structurally equivalent results, and path lookups are
/// memoized per path string.
pub struct Resolver {
    registry: Arc<MiddlewareRegistry>,
    symbols: SymbolTable,
    path_cache: RwLock<HashMap<String, ResolvedMiddleware>>,
}

impl Resolver {
    /// Creates a resolver over a registry and a symbol table.
    #[must_use]
    pub fn new(registry: Arc<MiddlewareRegistry>, symbols: SymbolTable) -> Self {
        Self {
            registry,
            symbols,
            path_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the registry this resolver consults for named references.
    #[must_use]
    pub fn registry(&self) -> &Arc<MiddlewareRegistry> {
        &self.registry
    }

    /// Resolves a reference into its canonical form.
    pub fn resolve(&self, reference: &MiddlewareRef) -> KernelResult<ResolvedMiddleware> {
        self.resolve_at_depth(reference, 0)
    }

    fn resolve_at_depth(
        &self,
        reference: &MiddlewareRef,
        depth: usize,
    ) -> KernelResult<ResolvedMiddleware> {
        if depth > MAX_NAME_DEPTH {
            return Err(KernelError::InvalidMiddlewareType {
                detail: format!("reference {reference:?} resolves through a name cycle"),
            });
        }

        match reference {
            MiddlewareRef::Named(name) => {
                let underlying = self.registry.lookup(name)?;
                self.resolve_at_depth(&underlying, depth + 1)
            }
            MiddlewareRef::Path(path) => {
                if let Some(cached) = self.path_cache.read().get(path) {
                    return Ok(cached.clone());
                }
                let resolved = self.symbols.lookup(path)?;
                self.path_cache
                    .write()
                    .insert(path.clone(), resolved.clone());
                Ok(resolved)
            }
            MiddlewareRef::Chain(factory) => Ok(ResolvedMiddleware::Chain(factory.clone())),
            MiddlewareRef::Transport(factory) => {
                Ok(ResolvedMiddleware::Transport(factory.clone()))
            }
        }
    }
}
