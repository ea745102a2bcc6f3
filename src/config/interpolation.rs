//! Placeholder interpolation for task templates.
//!
//! Task paths and command arguments may reference parameters and instance
//! bindings using `${name}` syntax.
//!
//! # Syntax
//!
//! - `${name}` - replaced with the binding or parameter value
//! - `$${escaped}` - produces literal `${escaped}` in output
//!
//! # Example
//!
//! ```
//! use runnel::config::{resolve_string, InterpolationContext, ParameterStore};
//!
//! let params = ParameterStore::new().with("GRM_dir", "grm");
//! let ctx = InterpolationContext::new(&params).bind("title", "test");
//! let path = resolve_string("${GRM_dir}/${title}", &ctx, "generate_grm").unwrap();
//! assert_eq!(path, "grm/test");
//! ```

use std::collections::{BTreeMap, HashSet};

use crate::config::params::ParameterStore;
use crate::error::{Result, RunnelError};

/// A segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Placeholder reference: ${name}
    Variable(String),
}

/// Parse a string containing ${name} placeholders.
pub fn parse_interpolation(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current_literal = String::new();

    while let Some(c) = chars.next() {
        if c != '$' {
            current_literal.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                if chars.peek() == Some(&'{') {
                    // $${...} -> literal ${...}
                    chars.next();
                    current_literal.push_str("${");
                    for c in chars.by_ref() {
                        current_literal.push(c);
                        if c == '}' {
                            break;
                        }
                    }
                } else {
                    current_literal.push('$');
                }
            }
            Some('{') => {
                chars.next();

                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }

                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    name.push(c);
                }

                segments.push(Segment::Variable(name.trim().to_string()));
            }
            _ => current_literal.push(c),
        }
    }

    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

/// Extract all placeholder names from a template.
pub fn extract_variables(input: &str) -> HashSet<String> {
    parse_interpolation(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Variable(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Check if a string contains any placeholder.
pub fn has_interpolation(input: &str) -> bool {
    parse_interpolation(input)
        .iter()
        .any(|seg| matches!(seg, Segment::Variable(_)))
}

/// Context for placeholder resolution.
///
/// Names are resolved in priority order:
/// 1. Scalar instance bindings (`chrom`, `input`, `output`)
/// 2. List bindings (`inputs`, `outputs`), joined with spaces
/// 3. Parameter Store values
#[derive(Debug, Clone)]
pub struct InterpolationContext<'a> {
    params: &'a ParameterStore,
    bindings: BTreeMap<String, String>,
    lists: BTreeMap<String, Vec<String>>,
}

impl<'a> InterpolationContext<'a> {
    /// Create a context backed by the Parameter Store.
    pub fn new(params: &'a ParameterStore) -> Self {
        Self {
            params,
            bindings: BTreeMap::new(),
            lists: BTreeMap::new(),
        }
    }

    /// Add a scalar binding.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Add a list binding.
    pub fn bind_list(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.lists.insert(name.into(), values);
        self
    }

    /// Scalar bindings of this context.
    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    /// Get a list binding by name.
    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    /// Resolve a placeholder name to its value.
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.bindings
            .get(name)
            .cloned()
            .or_else(|| self.lists.get(name).map(|values| values.join(" ")))
            .or_else(|| self.params.get(name))
    }
}

/// Resolve all placeholders in a template.
///
/// # Errors
///
/// Returns `UnresolvedPlaceholder` naming `task` if any placeholder has no
/// binding.
pub fn resolve_string(input: &str, context: &InterpolationContext<'_>, task: &str) -> Result<String> {
    let mut result = String::new();

    for segment in parse_interpolation(input) {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Variable(name) => {
                let value =
                    context
                        .resolve(&name)
                        .ok_or_else(|| RunnelError::UnresolvedPlaceholder {
                            placeholder: name.clone(),
                            task: task.to_string(),
                        })?;
                result.push_str(&value);
            }
        }
    }

    Ok(result)
}
