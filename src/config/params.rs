//! The Parameter Store.
//!
//! Holds the flattened `params` section of the configuration. Nested
//! mappings are flattened with `_`, so `GRM: { dir: grm }` is available as
//! `GRM_dir`. The store is built once and passed by reference to every
//! component that needs it.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::error::{Result, RunnelError};

/// Flattened, read-only parameter mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    values: BTreeMap<String, Value>,
}

impl ParameterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a `params` mapping.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a key is not a string.
    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        let mut store = Self::new();
        flatten_into(&mut store.values, None, mapping)?;
        Ok(store)
    }

    /// Add or replace a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up a scalar parameter rendered as a string.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(scalar_to_string)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Look up a required scalar parameter.
    pub fn require(&self, key: &str) -> Result<String> {
        let value = self.require_value(key)?;
        scalar_to_string(value).ok_or_else(|| {
            RunnelError::config(format!("parameter '{}' must be a scalar value", key))
        })
    }

    /// Look up a required non-negative integer parameter.
    pub fn require_usize(&self, key: &str) -> Result<usize> {
        let raw = self.require(key)?;
        raw.trim().parse().map_err(|_| {
            RunnelError::config(format!(
                "parameter '{}' must be a non-negative integer, got '{}'",
                key, raw
            ))
        })
    }

    /// Look up a required list parameter, each element rendered as a string.
    ///
    /// A scalar is treated as a single-element list.
    pub fn require_list(&self, key: &str) -> Result<Vec<String>> {
        match self.require_value(key)? {
            Value::Sequence(items) => items
                .iter()
                .map(|item| {
                    scalar_to_string(item).ok_or_else(|| {
                        RunnelError::config(format!(
                            "parameter '{}' must be a list of scalars",
                            key
                        ))
                    })
                })
                .collect(),
            other => scalar_to_string(other).map(|s| vec![s]).ok_or_else(|| {
                RunnelError::config(format!("parameter '{}' must be a list", key))
            }),
        }
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require_value(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| RunnelError::config(format!("missing required parameter '{}'", key)))
    }
}

/// Render a scalar YAML value as a string.
///
/// Returns `None` for sequences, mappings and null.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn flatten_into(
    out: &mut BTreeMap<String, Value>,
    prefix: Option<&str>,
    mapping: &Mapping,
) -> Result<()> {
    for (key, value) in mapping {
        let key = scalar_to_string(key)
            .ok_or_else(|| RunnelError::config(format!("invalid parameter key: {:?}", key)))?;
        let full = match prefix {
            Some(p) => format!("{}_{}", p, key),
            None => key,
        };
        match value {
            Value::Mapping(nested) => flatten_into(out, Some(&full), nested)?,
            other => {
                out.insert(full, other.clone());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(yaml: &str) -> ParameterStore {
        let mapping: Mapping = serde_yaml::from_str(yaml).unwrap();
        ParameterStore::from_mapping(&mapping).unwrap()
    }

    #[test]
    fn flattens_nested_sections() {
        let params = store("GRM:\n  dir: grm\nasso:\n  dir: asso\ninp_title: test\n");
        assert_eq!(params.get("GRM_dir").as_deref(), Some("grm"));
        assert_eq!(params.get("asso_dir").as_deref(), Some("asso"));
        assert_eq!(params.get("inp_title").as_deref(), Some("test"));
        assert!(!params.contains("GRM"));
    }

    #[test]
    fn renders_numbers_and_bools() {
        let params = store("chrom_count: 22\nsparse: true\ncutoff: 0.05\n");
        assert_eq!(params.get("chrom_count").as_deref(), Some("22"));
        assert_eq!(params.get("sparse").as_deref(), Some("true"));
        assert_eq!(params.get("cutoff").as_deref(), Some("0.05"));
    }

    #[test]
    fn require_missing_key_names_the_key() {
        let params = ParameterStore::new();
        let err = params.require("pheno").unwrap_err();
        assert!(matches!(err, RunnelError::Configuration { .. }));
        assert!(err.to_string().contains("pheno"));
    }

    #[test]
    fn require_usize_parses_integers() {
        let params = store("chrom_count: 22\nbad: twelve\n");
        assert_eq!(params.require_usize("chrom_count").unwrap(), 22);
        assert!(params.require_usize("bad").is_err());
    }

    #[test]
    fn require_list_handles_sequences_and_scalars() {
        let params = store("chroms: [1, 2, X]\nsingle: 7\n");
        assert_eq!(params.require_list("chroms").unwrap(), vec!["1", "2", "X"]);
        assert_eq!(params.require_list("single").unwrap(), vec!["7"]);
    }

    #[test]
    fn require_rejects_sequences_as_scalars() {
        let params = store("chroms: [1, 2]\n");
        assert!(params.get("chroms").is_none());
        assert!(params.require("chroms").is_err());
    }

    #[test]
    fn with_adds_parameters() {
        let params = ParameterStore::new().with("a", "x").with("n", 3);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("n").as_deref(), Some("3"));
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "n"]);
    }
}
