//! The named middleware registry.
//!
//! The registry maps stable string names to middleware references. It is an
//! explicitly constructed object owned by the application's composition root
//! and shared behind an `Arc`, which keeps test setups free of hidden global
//! state: every test can seed its own registry.
//!
//! Mutation is serialized by a `parking_lot` lock. Writes are rare and
//! confined to startup; lookups dominate afterwards.

use crate::resolver::MiddlewareRef;
use lamina_core::{KernelError, KernelResult};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-wide mapping from name to middleware reference.
///
/// # Example
///
/// ```
/// use lamina_middleware::{MiddlewareRegistry, MiddlewareRef};
///
/// let registry = MiddlewareRegistry::new();
/// registry.register("cors", MiddlewareRef::path("lamina_middleware::stages::cors::Cors")).unwrap();
/// assert!(registry.contains("cors"));
///
/// // A second registration under the same name is a conflict...
/// let err = registry
///     .register("cors", MiddlewareRef::named("other"))
///     .unwrap_err();
/// assert_eq!(err.code(), "duplicate_name");
///
/// // ...unless override is explicit.
/// registry.register_override("cors", MiddlewareRef::named("other"));
/// ```
#[derive(Default)]
pub struct MiddlewareRegistry {
    entries: RwLock<HashMap<String, MiddlewareRef>>,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `reference`.
    ///
    /// Fails with [`KernelError::DuplicateName`] if the name is already
    /// bound; use [`register_override`](Self::register_override) to rebind.
    pub fn register(&self, name: impl Into<String>, reference: MiddlewareRef) -> KernelResult<()> {
        let name = name.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(KernelError::DuplicateName { name });
        }
        entries.insert(name, reference);
        Ok(())
    }

    /// Binds `name` to `reference`, replacing any existing binding.
    pub fn register_override(&self, name: impl Into<String>, reference: MiddlewareRef) {
        self.entries.write().insert(name.into(), reference);
    }

    /// Returns the reference bound to `name`.
    ///
    /// Fails with [`KernelError::UnknownMiddlewareName`] if absent.
    pub fn lookup(&self, name: &str) -> KernelResult<MiddlewareRef> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KernelError::UnknownMiddlewareName {
                name: name.to_string(),
            })
    }

    /// Returns true if `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Returns the number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Merges a static name table into the registry.
    ///
    /// Every entry is bound with override semantics, so reloading the same
    /// table on repeated startup is idempotent and never errors.
    pub fn bulk_load<I, S>(&self, table: I)
    where
        I: IntoIterator<Item = (S, MiddlewareRef)>,
        S: Into<String>,
    {
        let mut entries = self.entries.write();
        for (name, reference) in table {
            entries.insert(name.into(), reference);
        }
    }
}
