//! Task Descriptors.
//!
//! A [`TaskDescriptor`] is the declarative, immutable specification of one
//! pipeline step. Descriptors are registered explicitly, either through the
//! builder methods here or from a `tasks:` configuration entry, and are
//! consumed by the graph build phase.
//!
//! # Example
//!
//! ```
//! use runnel::tasks::{CommandTemplate, TaskDescriptor};
//!
//! let grm = TaskDescriptor::new("generate_grm")
//!     .mkdir("${GRM_dir}")
//!     .output("${GRM_dir}/${inp_title}.grm.sp")
//!     .command(CommandTemplate::new("gcta64").args(["--bfile", "${inp_title}"]));
//!
//! let gwa = TaskDescriptor::new("mlm_gwa").follows("generate_grm");
//! assert_eq!(gwa.follows, vec!["generate_grm"]);
//! assert!(grm.command.is_some());
//! ```

use regex::Regex;

use crate::config::{scalar_to_string, FanOutConfig, TaskConfig, TransformConfig};
use crate::error::{Result, RunnelError};
use crate::tasks::command::CommandTemplate;

/// Where a fan-out descriptor gets its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    /// Literal values.
    Values(Vec<String>),
    /// `1..=N` where N is the named parameter.
    Count(String),
    /// A list-valued parameter.
    Param(String),
}

/// How a transform derives an output path from an input path.
#[derive(Debug, Clone)]
pub enum TransformRule {
    /// Replace a trailing suffix.
    Suffix { suffix: String, replace: String },
    /// Regex substitution (`$1` style captures) over the whole path.
    Regex { regex: Regex, replace: String },
}

impl TransformRule {
    /// Derive the output path for `input`, or `None` if the rule does not apply.
    pub fn apply(&self, input: &str) -> Option<String> {
        match self {
            TransformRule::Suffix { suffix, replace } => input
                .strip_suffix(suffix.as_str())
                .map(|stem| format!("{}{}", stem, replace)),
            TransformRule::Regex { regex, replace } => regex
                .is_match(input)
                .then(|| regex.replace(input, replace.as_str()).into_owned()),
        }
    }
}

/// How a descriptor is instantiated.
#[derive(Debug, Clone, Default)]
pub enum Expansion {
    /// Exactly one instance.
    #[default]
    Single,
    /// One instance per bound value.
    FanOut {
        binding: String,
        source: BindingSource,
    },
    /// One instance per file matching `input`.
    Transform { input: String, rule: TransformRule },
}

/// Declarative specification of one pipeline step.
#[derive(Debug, Clone, Default)]
pub struct TaskDescriptor {
    /// Unique task name.
    pub name: String,

    /// Description shown by `list`.
    pub description: Option<String>,

    /// Input pattern templates, in declaration order.
    pub inputs: Vec<String>,

    /// Output path templates, in declaration order.
    pub outputs: Vec<String>,

    /// Tasks whose every instance must reach a terminal state first.
    pub follows: Vec<String>,

    /// Directory that must exist before execution.
    pub mkdir: Option<String>,

    /// Command to run when stale; `None` for aggregation targets.
    pub command: Option<CommandTemplate>,

    /// Instantiation rule.
    pub expansion: Expansion,
}

impl TaskDescriptor {
    /// Create a descriptor with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare an input pattern.
    pub fn input(mut self, pattern: impl Into<String>) -> Self {
        self.inputs.push(pattern.into());
        self
    }

    /// Declare an output path.
    pub fn output(mut self, path: impl Into<String>) -> Self {
        self.outputs.push(path.into());
        self
    }

    /// Depend on every instance of `task`.
    pub fn follows(mut self, task: impl Into<String>) -> Self {
        self.follows.push(task.into());
        self
    }

    /// Require a directory before execution.
    pub fn mkdir(mut self, dir: impl Into<String>) -> Self {
        self.mkdir = Some(dir.into());
        self
    }

    /// Set the command.
    pub fn command(mut self, command: CommandTemplate) -> Self {
        self.command = Some(command);
        self
    }

    /// Fan out over `source`, binding each value to `${binding}`.
    pub fn fan_out(mut self, binding: impl Into<String>, source: BindingSource) -> Self {
        self.expansion = Expansion::FanOut {
            binding: binding.into(),
            source,
        };
        self
    }

    /// Instantiate once per file matching `input`.
    pub fn transform(mut self, input: impl Into<String>, rule: TransformRule) -> Self {
        self.expansion = Expansion::Transform {
            input: input.into(),
            rule,
        };
        self
    }

    /// Whether this descriptor expands per matching input file.
    pub fn is_transform(&self) -> bool {
        matches!(self.expansion, Expansion::Transform { .. })
    }

    /// Build from a configuration entry.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an empty name, conflicting expansion rules,
    /// or an invalid transform regex.
    pub fn from_config(config: &TaskConfig) -> Result<Self> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(RunnelError::config("every task needs a non-empty name"));
        }

        let command = config
            .command
            .as_ref()
            .map(CommandTemplate::from_config)
            .transpose()
            .map_err(|e| RunnelError::config(format!("task '{}': {}", name, e)))?;

        let expansion = match (&config.fan_out, &config.transform) {
            (Some(_), Some(_)) => {
                return Err(RunnelError::config(format!(
                    "task '{}' declares both fan_out and transform",
                    name
                )))
            }
            (Some(fan_out), None) => fan_out_expansion(name, fan_out)?,
            (None, Some(transform)) => transform_expansion(name, transform)?,
            (None, None) => Expansion::Single,
        };

        Ok(Self {
            name: name.to_string(),
            description: config.description.clone(),
            inputs: config.inputs.clone(),
            outputs: config.outputs.clone(),
            follows: config.follows.clone(),
            mkdir: config.mkdir.clone(),
            command,
            expansion,
        })
    }
}

fn fan_out_expansion(task: &str, config: &FanOutConfig) -> Result<Expansion> {
    if config.name.trim().is_empty() {
        return Err(RunnelError::config(format!(
            "task '{}': fan_out needs a binding name",
            task
        )));
    }

    let source = match (&config.count, &config.values, &config.param) {
        (Some(count), None, None) => BindingSource::Count(count.clone()),
        (None, Some(values), None) => BindingSource::Values(
            values
                .iter()
                .map(|v| {
                    scalar_to_string(v).ok_or_else(|| {
                        RunnelError::config(format!(
                            "task '{}': fan_out values must be scalars",
                            task
                        ))
                    })
                })
                .collect::<Result<_>>()?,
        ),
        (None, None, Some(param)) => BindingSource::Param(param.clone()),
        _ => {
            return Err(RunnelError::config(format!(
                "task '{}': fan_out needs exactly one of count, values or param",
                task
            )))
        }
    };

    Ok(Expansion::FanOut {
        binding: config.name.trim().to_string(),
        source,
    })
}

fn transform_expansion(task: &str, config: &TransformConfig) -> Result<Expansion> {
    let rule = match (&config.suffix, &config.regex) {
        (Some(suffix), None) => TransformRule::Suffix {
            suffix: suffix.clone(),
            replace: config.replace.clone(),
        },
        (None, Some(pattern)) => TransformRule::Regex {
            regex: Regex::new(pattern).map_err(|e| {
                RunnelError::config(format!("task '{}': invalid transform regex: {}", task, e))
            })?,
            replace: config.replace.clone(),
        },
        _ => {
            return Err(RunnelError::config(format!(
                "task '{}': transform needs exactly one of suffix or regex",
                task
            )))
        }
    };

    Ok(Expansion::Transform {
        input: config.input.clone(),
        rule,
    })
}
