//! The Fan-out Expander.
//!
//! Turns one [`TaskDescriptor`] into one or more [`TaskInstance`]s. Paths are
//! rendered here; input patterns are resolved to concrete paths and the
//! command is rendered later by the graph builder, once every instance's
//! declared outputs are known.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::config::{resolve_string, InterpolationContext, ParameterStore};
use crate::error::{Result, RunnelError};
use crate::tasks::command::CommandSpec;
use crate::tasks::descriptor::{BindingSource, Expansion, TaskDescriptor};
use crate::tasks::patterns::{normalize, PathPattern};

/// Values bound to one instance of a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    /// Suffix for the instance id, e.g. `chrom=3`.
    pub label: Option<String>,

    /// Scalar bindings visible to templates.
    pub values: BTreeMap<String, String>,
}

impl Binding {
    /// A binding with no values (single-instance descriptors).
    pub fn unit() -> Self {
        Self::default()
    }

    /// A fan-out binding `name=value`.
    pub fn fan_out(name: &str, value: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert(name.to_string(), value.to_string());
        Self {
            label: Some(format!("{}={}", name, value)),
            values,
        }
    }

    /// A transform binding from one input to one output.
    pub fn transform(input: &str, output: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert("input".to_string(), input.to_string());
        values.insert("output".to_string(), output.to_string());
        Self {
            label: Some(input.to_string()),
            values,
        }
    }
}

/// A descriptor bound to concrete paths for one execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInstance {
    /// Unique instance id: `task` or `task[label]`.
    pub id: String,

    /// Name of the descriptor this instance came from.
    pub task: String,

    /// Scalar bindings of this instance.
    pub bindings: BTreeMap<String, String>,

    /// Rendered input patterns.
    pub input_patterns: Vec<String>,

    /// Resolved input paths.
    pub inputs: Vec<PathBuf>,

    /// Resolved output paths.
    pub outputs: Vec<PathBuf>,

    /// Directory to create before running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mkdir: Option<PathBuf>,

    /// Rendered command; `None` for aggregation targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
}

impl TaskInstance {
    /// Compiled input patterns.
    pub fn patterns(&self) -> Vec<PathPattern> {
        self.input_patterns
            .iter()
            .map(|p| PathPattern::new(p))
            .collect()
    }

    /// A file-name-safe version of the id, used for log files.
    pub fn slug(&self) -> String {
        self.id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Render the command template against params, bindings and resolved paths.
    pub fn render_command(
        &mut self,
        descriptor: &TaskDescriptor,
        params: &ParameterStore,
    ) -> Result<()> {
        let Some(template) = &descriptor.command else {
            self.command = None;
            return Ok(());
        };
        let ctx = self.context(params);
        self.command = Some(template.render(&ctx, &self.id)?);
        Ok(())
    }

    /// Interpolation context for this instance.
    pub fn context<'a>(&self, params: &'a ParameterStore) -> InterpolationContext<'a> {
        let mut ctx = InterpolationContext::new(params);
        for (name, value) in &self.bindings {
            ctx = ctx.bind(name.clone(), value.clone());
        }
        ctx.bind_list("inputs", paths_to_strings(&self.inputs))
            .bind_list("outputs", paths_to_strings(&self.outputs))
    }
}

fn paths_to_strings(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

/// Compute the bindings for a descriptor.
///
/// `candidates` are declared outputs of already-expanded instances; transform
/// descriptors match them together with files on disk.
///
/// # Errors
///
/// Returns `Configuration` if a fan-out parameter is missing or invalid, and
/// `UnresolvedPlaceholder` if the transform input pattern cannot be rendered.
pub fn bindings_for(
    descriptor: &TaskDescriptor,
    params: &ParameterStore,
    candidates: &[PathBuf],
) -> Result<Vec<Binding>> {
    match &descriptor.expansion {
        Expansion::Single => Ok(vec![Binding::unit()]),

        Expansion::FanOut { binding, source } => {
            let values = match source {
                BindingSource::Values(values) => values.clone(),
                BindingSource::Count(param) => (1..=params.require_usize(param)?)
                    .map(|n| n.to_string())
                    .collect(),
                BindingSource::Param(param) => params.require_list(param)?,
            };
            Ok(values
                .iter()
                .map(|value| Binding::fan_out(binding, value))
                .collect())
        }

        Expansion::Transform { input, rule } => {
            let ctx = InterpolationContext::new(params);
            let pattern = PathPattern::new(&resolve_string(input, &ctx, &descriptor.name)?);

            let mut matched: Vec<PathBuf> = candidates
                .iter()
                .filter(|c| pattern.matches(c))
                .cloned()
                .collect();
            for on_disk in pattern.expand_on_disk() {
                if !matched
                    .iter()
                    .any(|m| normalize(m) == normalize(&on_disk))
                {
                    matched.push(on_disk);
                }
            }

            Ok(matched
                .iter()
                .filter_map(|path| {
                    let input = path.display().to_string();
                    rule.apply(&input)
                        .map(|output| Binding::transform(&input, &output))
                })
                .collect())
        }
    }
}

/// Expand a descriptor into one instance per binding.
///
/// Transform instances take their matched file as the first input and, when
/// the descriptor declares no outputs, the derived path as their only output.
pub fn expand(
    descriptor: &TaskDescriptor,
    bindings: &[Binding],
    params: &ParameterStore,
) -> Result<Vec<TaskInstance>> {
    let mut instances = Vec::with_capacity(bindings.len());

    for binding in bindings {
        let id = match &binding.label {
            Some(label) => format!("{}[{}]", descriptor.name, label),
            None => descriptor.name.clone(),
        };

        let mut ctx = InterpolationContext::new(params);
        for (name, value) in &binding.values {
            ctx = ctx.bind(name.clone(), value.clone());
        }

        let mut input_patterns = Vec::new();
        let mut outputs = Vec::new();
        if descriptor.is_transform() {
            if let Some(input) = binding.values.get("input") {
                input_patterns.push(input.clone());
            }
            if descriptor.outputs.is_empty() {
                if let Some(output) = binding.values.get("output") {
                    outputs.push(PathBuf::from(output));
                }
            }
        }
        for pattern in &descriptor.inputs {
            input_patterns.push(resolve_string(pattern, &ctx, &id)?);
        }
        for output in &descriptor.outputs {
            let rendered = resolve_string(output, &ctx, &id)?;
            if PathPattern::new(&rendered).is_literal() {
                outputs.push(PathBuf::from(rendered));
            } else {
                return Err(RunnelError::config(format!(
                    "task '{}': output '{}' must be a concrete path, not a pattern",
                    id, rendered
                )));
            }
        }

        let mkdir = descriptor
            .mkdir
            .as_deref()
            .map(|dir| resolve_string(dir, &ctx, &id).map(PathBuf::from))
            .transpose()?;

        instances.push(TaskInstance {
            id,
            task: descriptor.name.clone(),
            bindings: binding.values.clone(),
            input_patterns,
            inputs: Vec::new(),
            outputs,
            mkdir,
            command: None,
        });
    }

    debug!(
        "Expanded task '{}' into {} instance(s)",
        descriptor.name,
        instances.len()
    );

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::command::CommandTemplate;
    use crate::tasks::descriptor::TransformRule;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn single_descriptor_expands_once() {
        let params = ParameterStore::new().with("GRM_dir", "grm").with("inp_title", "test");
        let desc = TaskDescriptor::new("generate_grm")
            .mkdir("${GRM_dir}")
            .output("${GRM_dir}/${inp_title}.grm.sp");

        let bindings = bindings_for(&desc, &params, &[]).unwrap();
        let instances = expand(&desc, &bindings, &params).unwrap();

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, "generate_grm");
        assert_eq!(instances[0].outputs, vec![PathBuf::from("grm/test.grm.sp")]);
        assert_eq!(instances[0].mkdir, Some(PathBuf::from("grm")));
    }

    #[test]
    fn count_fan_out_binds_one_based_values() {
        let params = ParameterStore::new().with("chrom_count", 4);
        let desc = TaskDescriptor::new("per_chrom")
            .fan_out("chrom", BindingSource::Count("chrom_count".to_string()))
            .output("out/chr${chrom}.tsv");

        let bindings = bindings_for(&desc, &params, &[]).unwrap();
        let instances = expand(&desc, &bindings, &params).unwrap();

        let ids: Vec<_> = instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "per_chrom[chrom=1]",
                "per_chrom[chrom=2]",
                "per_chrom[chrom=3]",
                "per_chrom[chrom=4]"
            ]
        );
        assert_eq!(instances[3].outputs, vec![PathBuf::from("out/chr4.tsv")]);
        assert_eq!(instances[3].bindings["chrom"], "4");
    }

    #[test]
    fn missing_count_parameter_is_configuration_error() {
        let params = ParameterStore::new();
        let desc = TaskDescriptor::new("per_chrom")
            .fan_out("chrom", BindingSource::Count("chrom_count".to_string()));

        let err = bindings_for(&desc, &params, &[]).unwrap_err();
        assert!(matches!(err, RunnelError::Configuration { .. }));
        assert!(err.to_string().contains("chrom_count"));
    }

    #[test]
    fn param_fan_out_uses_list() {
        let params = ParameterStore::new().with("chroms", vec!["X", "Y"]);
        let desc = TaskDescriptor::new("sex_chrom")
            .fan_out("chrom", BindingSource::Param("chroms".to_string()));

        let bindings = bindings_for(&desc, &params, &[]).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].values["chrom"], "Y");
    }

    #[test]
    fn transform_matches_declared_outputs_and_disk() {
        let temp = TempDir::new().unwrap();
        let asso = temp.path().join("asso");
        fs::create_dir_all(&asso).unwrap();
        fs::write(asso.join("old.fastGWA"), "").unwrap();

        let params = ParameterStore::new().with("asso_dir", asso.display().to_string());
        let desc = TaskDescriptor::new("reformat").transform(
            "${asso_dir}/*.fastGWA",
            TransformRule::Suffix {
                suffix: ".fastGWA".to_string(),
                replace: ".tsv".to_string(),
            },
        );
        let declared = vec![asso.join("test.fastGWA"), asso.join("other.txt")];

        let bindings = bindings_for(&desc, &params, &declared).unwrap();
        let instances = expand(&desc, &bindings, &params).unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].outputs, vec![asso.join("test.tsv")]);
        assert_eq!(instances[1].outputs, vec![asso.join("old.tsv")]);
        assert_eq!(
            instances[0].input_patterns,
            vec![asso.join("test.fastGWA").display().to_string()]
        );
    }

    #[test]
    fn glob_outputs_are_rejected() {
        let params = ParameterStore::new();
        let desc = TaskDescriptor::new("bad").output("out/*.tsv");
        let err = expand(&desc, &[Binding::unit()], &params).unwrap_err();
        assert!(err.to_string().contains("concrete path"));
    }

    #[test]
    fn render_command_sees_resolved_inputs() {
        let params = ParameterStore::new();
        let desc = TaskDescriptor::new("concat")
            .output("all.tsv")
            .command(CommandTemplate::new("cat").args(["${inputs}", "${outputs}"]));
        let mut instance = expand(&desc, &[Binding::unit()], &params)
            .unwrap()
            .remove(0);
        instance.inputs = vec![PathBuf::from("a.tsv"), PathBuf::from("b.tsv")];

        instance.render_command(&desc, &params).unwrap();

        let command = instance.command.unwrap();
        assert_eq!(command.args, vec!["a.tsv", "b.tsv", "all.tsv"]);
    }

    #[test]
    fn slug_is_file_name_safe() {
        let params = ParameterStore::new();
        let desc = TaskDescriptor::new("per_chrom");
        let instance = expand(&desc, &[Binding::fan_out("chrom", "3")], &params)
            .unwrap()
            .remove(0);
        assert_eq!(instance.slug(), "per_chrom_chrom_3_");
    }
}
