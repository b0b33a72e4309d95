//! Declarative stack configuration.
//!
//! A [`StackConfig`] is the serde-deserializable form of a global stack
//! definition: an ordered list of entries naming a middleware by reference
//! string, with construction arguments, group tags, and an optional
//! registered name. It lowers into the typed [`StackDefinition`].
//!
//! Reference strings containing `::` are treated as symbol paths; anything
//! else is a registered name.

use crate::descriptor::{StackDefinition, StackEntry};
use crate::resolver::MiddlewareRef;
use lamina_core::ConstructionArgs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One configured stack entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntryConfig {
    /// Registered name, or `module::Symbol` path.
    pub reference: String,
    /// Construction arguments passed to the middleware factory.
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Group tags for selective installation.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Optional name to bind into the registry at load time.
    #[serde(default)]
    pub name: Option<String>,
}

/// A declarative, ordered global stack.
///
/// # Example
///
/// ```
/// use lamina_middleware::StackConfig;
///
/// let config = StackConfig::from_json(r#"{
///     "middlewares": [
///         { "reference": "cors", "groups": ["api"] },
///         { "reference": "gzip", "args": { "min_size": 512 } }
///     ]
/// }"#).unwrap();
/// assert_eq!(config.middlewares.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// The ordered stack entries.
    #[serde(default)]
    pub middlewares: Vec<StackEntryConfig>,
}

impl StackConfig {
    /// Parses a stack configuration from JSON.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Lowers the configuration into a typed stack definition.
    #[must_use]
    pub fn into_stack(self) -> StackDefinition {
        let entries = self
            .middlewares
            .into_iter()
            .map(|entry| {
                let reference = if entry.reference.contains("::") {
                    MiddlewareRef::path(entry.reference)
                } else {
                    MiddlewareRef::named(entry.reference)
                };

                let mut stack_entry = StackEntry::new(reference)
                    .with_args(ConstructionArgs::from_map(entry.args));
                for group in entry.groups {
                    stack_entry = stack_entry.group(group);
                }
                if let Some(name) = entry.name {
                    stack_entry = stack_entry.named(name);
                }
                stack_entry
            })
            .collect();

        StackDefinition::from_entries(entries)
    }
}
