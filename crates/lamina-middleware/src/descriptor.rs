//! Middleware descriptors and the global stack definition.
//!
//! A [`StackEntry`] is the declarative form an application writes: a
//! reference plus construction arguments, group tags, and an optional
//! registered name. Loading a [`StackDefinition`] resolves every entry into
//! an immutable [`MiddlewareDescriptor`], the unit the installer and the
//! registry operate on.

use crate::resolver::{MiddlewareRef, ResolvedMiddleware, Resolver};
use lamina_core::{ConstructionArgs, KernelResult};
use serde_json::Value;
use std::collections::BTreeSet;

/// One declarative entry of the global middleware stack.
#[derive(Debug, Clone)]
pub struct StackEntry {
    reference: MiddlewareRef,
    args: ConstructionArgs,
    groups: BTreeSet<String>,
    name: Option<String>,
}

impl StackEntry {
    /// Creates an entry for the given reference.
    #[must_use]
    pub fn new(reference: MiddlewareRef) -> Self {
        Self {
            reference,
            args: ConstructionArgs::new(),
            groups: BTreeSet::new(),
            name: None,
        }
    }

    /// Replaces the entry's construction arguments.
    #[must_use]
    pub fn with_args(mut self, args: ConstructionArgs) -> Self {
        self.args = args;
        self
    }

    /// Adds one construction argument.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Tags the entry with a group.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Gives the entry a registered name.
    ///
    /// Named entries are bound into the registry when the stack is loaded,
    /// with override semantics so repeated startup loads stay idempotent.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the entry's reference.
    #[must_use]
    pub fn reference(&self) -> &MiddlewareRef {
        &self.reference
    }
}

/// An immutable record pairing a resolved middleware with its construction
/// arguments, group memberships, and optional registered name.
///
/// Created once at stack load time; the global stack owns descriptors, and
/// the registry holds only the reference of named ones.
#[derive(Debug, Clone)]
pub struct MiddlewareDescriptor {
    reference: MiddlewareRef,
    resolved: ResolvedMiddleware,
    args: ConstructionArgs,
    groups: BTreeSet<String>,
    name: Option<String>,
}

impl MiddlewareDescriptor {
    /// Resolves an entry into a descriptor.
    ///
    /// Resolution failures propagate unchanged; a named entry is
    /// override-registered into the resolver's registry.
    pub fn resolve(resolver: &Resolver, entry: StackEntry) -> KernelResult<Self> {
        let resolved = resolver.resolve(&entry.reference)?;

        if let Some(name) = &entry.name {
            // Binding a name to a reference that is that same name would
            // make the registry self-referential.
            let self_referential =
                matches!(&entry.reference, MiddlewareRef::Named(n) if n == name);
            if !self_referential {
                resolver
                    .registry()
                    .register_override(name.clone(), entry.reference.clone());
            }
        }

        Ok(Self {
            reference: entry.reference,
            resolved,
            args: entry.args,
            groups: entry.groups,
            name: entry.name,
        })
    }

    /// Returns the original reference.
    #[must_use]
    pub fn reference(&self) -> &MiddlewareRef {
        &self.reference
    }

    /// Returns the resolved middleware.
    #[must_use]
    pub fn resolved(&self) -> &ResolvedMiddleware {
        &self.resolved
    }

    /// Returns the captured construction arguments.
    #[must_use]
    pub fn args(&self) -> &ConstructionArgs {
        &self.args
    }

    /// Returns the group tags.
    #[must_use]
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Returns the registered name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns true if this descriptor belongs to the given group filter.
    ///
    /// No filter matches every descriptor.
    #[must_use]
    pub fn in_group(&self, group: Option<&str>) -> bool {
        group.map_or(true, |group| self.groups.contains(group))
    }
}

/// The ordered global stack definition.
///
/// An application defines its stack once, as the single source of truth for
/// global middleware order, and loads it into descriptors at startup.
#[derive(Debug, Clone, Default)]
pub struct StackDefinition {
    entries: Vec<StackEntry>,
}

impl StackDefinition {
    /// Creates an empty stack definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stack definition from ordered entries.
    #[must_use]
    pub fn from_entries(entries: Vec<StackEntry>) -> Self {
        Self { entries }
    }

    /// Appends an entry to the stack.
    #[must_use]
    pub fn push(mut self, entry: StackEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the stack has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every entry, in order, into descriptors.
    ///
    /// Fails fast on the first unresolvable entry.
    pub fn load(self, resolver: &Resolver) -> KernelResult<Vec<MiddlewareDescriptor>> {
        self.entries
            .into_iter()
            .map(|entry| MiddlewareDescriptor::resolve(resolver, entry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MiddlewareRegistry;
    use crate::resolver::SymbolTable;
    use serde_json::json;
    use std::sync::Arc;

    fn passthrough(name: &str) -> MiddlewareRef {
        let name = name.to_string();
        MiddlewareRef::interceptor(name, |request, next| async move { next.run(request).await })
    }

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(MiddlewareRegistry::new()), SymbolTable::new())
    }

    #[test]
    fn test_entry_builder() {
        let entry = StackEntry::new(passthrough("a"))
            .arg("tag", json!("x"))
            .group("api")
            .group("debug")
            .named("a");

        let resolver = resolver();
        let descriptor = MiddlewareDescriptor::resolve(&resolver, entry).unwrap();

        assert_eq!(descriptor.args().get("tag"), Some(&json!("x")));
        assert!(descriptor.groups().contains("api"));
        assert!(descriptor.groups().contains("debug"));
        assert_eq!(descriptor.name(), Some("a"));
    }

    #[test]
    fn test_named_entry_registers() {
        let resolver = resolver();
        let entry = StackEntry::new(passthrough("logger")).named("logger");

        MiddlewareDescriptor::resolve(&resolver, entry).unwrap();
        assert!(resolver.registry().contains("logger"));
    }

    #[test]
    fn test_named_entry_reload_is_idempotent() {
        let resolver = resolver();
        for _ in 0..2 {
            let entry = StackEntry::new(passthrough("logger")).named("logger");
            MiddlewareDescriptor::resolve(&resolver, entry).unwrap();
        }
        assert_eq!(resolver.registry().len(), 1);
    }

    #[test]
    fn test_group_filter() {
        let resolver = resolver();
        let descriptor = MiddlewareDescriptor::resolve(
            &resolver,
            StackEntry::new(passthrough("a")).group("api"),
        )
        .unwrap();

        assert!(descriptor.in_group(None));
        assert!(descriptor.in_group(Some("api")));
        assert!(!descriptor.in_group(Some("debug")));
    }

    #[test]
    fn test_load_preserves_order() {
        let resolver = resolver();
        let stack = StackDefinition::new()
            .push(StackEntry::new(passthrough("first")))
            .push(StackEntry::new(passthrough("second")))
            .push(StackEntry::new(passthrough("third")));

        let descriptors = stack.load(&resolver).unwrap();
        let names: Vec<_> = descriptors
            .iter()
            .map(|d| d.resolved().name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_load_fails_fast_on_unknown_name() {
        let resolver = resolver();
        let stack = StackDefinition::new()
            .push(StackEntry::new(passthrough("ok")))
            .push(StackEntry::new(MiddlewareRef::named("missing")));

        assert!(stack.load(&resolver).is_err());
    }
}
