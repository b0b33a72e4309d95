//! Keyword-style construction arguments.
//!
//! A middleware descriptor captures the arguments its middleware will be
//! constructed with; construction itself is deferred until install or apply
//! time. Arguments are a JSON object so factories can deserialize them into
//! their own typed configuration with serde.

use crate::error::{KernelError, KernelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword-style arguments captured for deferred middleware construction.
///
/// # Example
///
/// ```
/// use lamina_core::ConstructionArgs;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct TagArgs {
///     #[serde(default)]
///     tag: String,
/// }
///
/// let mut args = ConstructionArgs::new();
/// args.insert("tag", serde_json::json!("hello"));
/// let parsed: TagArgs = args.deserialize().unwrap();
/// assert_eq!(parsed.tag, "hello");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructionArgs(Map<String, Value>);

impl ConstructionArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an argument set from a JSON object.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Inserts an argument, replacing any previous value under the key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Returns the argument under `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if no arguments were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserializes the whole argument set into a typed configuration.
    ///
    /// A mismatch is a configuration fault and maps to
    /// [`KernelError::InvalidMiddlewareType`].
    pub fn deserialize<T: DeserializeOwned>(&self) -> KernelResult<T> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|err| {
            KernelError::InvalidMiddlewareType {
                detail: format!("construction arguments do not match: {err}"),
            }
        })
    }
}

impl FromIterator<(String, Value)> for ConstructionArgs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_args() {
        let args = ConstructionArgs::new();
        assert!(args.is_empty());
        assert!(args.get("tag").is_none());
    }

    #[test]
    fn test_insert_and_get() {
        let mut args = ConstructionArgs::new();
        args.insert("label", json!("edge"));
        assert_eq!(args.get("label"), Some(&json!("edge")));
    }

    #[test]
    fn test_deserialize_mismatch_is_invalid_type() {
        #[derive(Debug, serde::Deserialize)]
        struct Strict {
            #[allow(dead_code)]
            count: u32,
        }

        let mut args = ConstructionArgs::new();
        args.insert("count", json!("not a number"));
        let err = args.deserialize::<Strict>().unwrap_err();
        assert_eq!(err.code(), "invalid_middleware_type");
    }
}
