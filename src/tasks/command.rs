//! Structured command templates.
//!
//! Commands are never run through a shell. A [`CommandTemplate`] holds a
//! program, argument templates, an optional working directory and
//! environment overrides; rendering it against an
//! [`InterpolationContext`] produces a concrete [`CommandSpec`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::interpolation::{parse_interpolation, resolve_string, Segment};
use crate::config::{CommandConfig, InterpolationContext};
use crate::error::{Result, RunnelError};

/// A command with unresolved placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTemplate {
    /// Program template.
    pub program: String,

    /// Argument templates.
    pub args: Vec<String>,

    /// Working directory template (inherits the engine's when absent).
    pub cwd: Option<String>,

    /// Environment override templates (merged over the inherited environment).
    pub env: BTreeMap<String, String>,
}

impl CommandTemplate {
    /// Create a template for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append an argument template.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several argument templates.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory template.
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build from a configuration declaration.
    pub fn from_config(config: &CommandConfig) -> Result<Self> {
        if config.program.trim().is_empty() {
            return Err(RunnelError::config("command program must not be empty"));
        }
        Ok(Self {
            program: config.program.clone(),
            args: config.args.clone(),
            cwd: config.cwd.clone(),
            env: config.env.clone(),
        })
    }

    /// Resolve every placeholder.
    ///
    /// An argument consisting solely of a list placeholder (`${inputs}`)
    /// expands into one argument per element.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedPlaceholder` naming `task` if any placeholder has
    /// no binding.
    pub fn render(&self, ctx: &InterpolationContext<'_>, task: &str) -> Result<CommandSpec> {
        let program = resolve_string(&self.program, ctx, task)?;

        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            match splat_target(arg, ctx) {
                Some(values) => args.extend(values.iter().cloned()),
                None => args.push(resolve_string(arg, ctx, task)?),
            }
        }

        let cwd = self
            .cwd
            .as_deref()
            .map(|cwd| resolve_string(cwd, ctx, task).map(PathBuf::from))
            .transpose()?;

        let env = self
            .env
            .iter()
            .map(|(key, value)| -> Result<(String, String)> {
                Ok((key.clone(), resolve_string(value, ctx, task)?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(CommandSpec {
            program,
            args,
            cwd,
            env,
        })
    }
}

fn splat_target<'c>(arg: &str, ctx: &'c InterpolationContext<'_>) -> Option<&'c [String]> {
    match parse_interpolation(arg).as_slice() {
        [Segment::Variable(name)] => ctx.list(name),
        _ => None,
    }
}

/// A fully resolved command, ready for the Job Runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,

    /// Arguments.
    pub args: Vec<String>,

    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Environment overrides.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Render as a single shell-like line for logs and dry runs.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c))
    {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
