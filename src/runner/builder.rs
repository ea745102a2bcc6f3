//! The Dependency Graph Builder.
//!
//! Consumes the full set of [`TaskDescriptor`]s and produces a [`Graph`] of
//! [`TaskInstance`]s. Everything that can fail before execution fails here:
//! unknown task names, missing parameters, unresolved placeholders, output
//! collisions and cycles.
//!
//! # Example
//!
//! ```
//! use runnel::config::ParameterStore;
//! use runnel::runner::GraphBuilder;
//! use runnel::tasks::{BindingSource, TaskDescriptor};
//!
//! let params = ParameterStore::new().with("chrom_count", 2);
//! let graph = GraphBuilder::new(params)
//!     .task(
//!         TaskDescriptor::new("per_chrom")
//!             .fan_out("chrom", BindingSource::Count("chrom_count".into()))
//!             .output("out/chr${chrom}.tsv"),
//!     )
//!     .task(TaskDescriptor::new("concat").input("out/chr*.tsv").output("out/all.tsv"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(graph.len(), 3);
//! assert_eq!(graph.order_ids(), vec!["per_chrom[chrom=1]", "per_chrom[chrom=2]", "concat"]);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::{ParameterStore, TaskConfig};
use crate::error::{Result, RunnelError};
use crate::runner::dependency::DependencyGraph;
use crate::tasks::fanout::{bindings_for, expand, TaskInstance};
use crate::tasks::patterns::{normalize, PathPattern};
use crate::tasks::TaskDescriptor;

/// How an edge was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// The consumer follows the producer's task.
    Follows,
    /// The consumer's input pattern matches the producer's output.
    Inferred,
}

/// Collects descriptors and builds the graph.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    params: ParameterStore,
    descriptors: Vec<TaskDescriptor>,
}

impl GraphBuilder {
    /// Create a builder over a parameter store.
    pub fn new(params: ParameterStore) -> Self {
        Self {
            params,
            descriptors: Vec::new(),
        }
    }

    /// Build descriptors from `tasks:` configuration entries.
    pub fn from_config(params: ParameterStore, tasks: &[TaskConfig]) -> Result<Self> {
        let descriptors = tasks
            .iter()
            .map(TaskDescriptor::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            params,
            descriptors,
        })
    }

    /// Register a descriptor.
    pub fn task(mut self, descriptor: TaskDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Registered descriptors, in declaration order.
    pub fn descriptors(&self) -> &[TaskDescriptor] {
        &self.descriptors
    }

    /// Build the graph.
    pub fn build(&self) -> Result<Graph> {
        build(&self.params, &self.descriptors)
    }
}

/// Build a graph from descriptors.
///
/// # Errors
///
/// - `Configuration` for duplicate names, unknown `follows` targets or
///   missing parameters
/// - `UnresolvedPlaceholder` for unrenderable templates
/// - `OutputCollision` when two instances declare the same output
/// - `CyclicDependency` naming the cycle
pub fn build(params: &ParameterStore, descriptors: &[TaskDescriptor]) -> Result<Graph> {
    validate_names(descriptors)?;

    let per_descriptor = expand_all(params, descriptors)?;

    let mut instances = Vec::new();
    let mut descriptor_of = Vec::new();
    for (index, expanded) in per_descriptor.into_iter().enumerate() {
        for instance in expanded {
            instances.push(instance);
            descriptor_of.push(index);
        }
    }

    check_collisions(&instances)?;

    let mut deps = DependencyGraph::with_nodes(instances.len());
    let mut kinds = HashMap::new();

    add_follows_edges(descriptors, &instances, &mut deps, &mut kinds);
    add_inferred_edges(&mut instances, &mut deps, &mut kinds);

    for (instance, &index) in instances.iter_mut().zip(&descriptor_of) {
        instance.render_command(&descriptors[index], params)?;
    }

    if let Some(cycle) = deps.find_cycle() {
        let names: Vec<&str> = cycle
            .iter()
            .rev()
            .map(|&i| instances[i].id.as_str())
            .collect();
        return Err(RunnelError::CyclicDependency {
            cycle: names.join(" -> "),
        });
    }

    let order = deps
        .topological_order()
        .ok_or_else(|| RunnelError::config("task graph is not acyclic"))?;

    debug!(
        "Built graph with {} instance(s) and {} edge(s)",
        instances.len(),
        deps.edge_count()
    );

    let graph = Graph {
        tasks: descriptors.iter().map(|d| d.name.clone()).collect(),
        descriptions: descriptors.iter().map(|d| d.description.clone()).collect(),
        instances,
        deps,
        kinds,
        order,
    };

    for id in graph.always_stale() {
        warn!(
            "{} runs a command but declares no inputs, outputs or prerequisites; \
             it will run on every invocation",
            id
        );
    }

    Ok(graph)
}

fn validate_names(descriptors: &[TaskDescriptor]) -> Result<()> {
    let mut seen = HashSet::new();
    for desc in descriptors {
        if !seen.insert(desc.name.as_str()) {
            return Err(RunnelError::config(format!(
                "task '{}' is declared more than once",
                desc.name
            )));
        }
    }
    for desc in descriptors {
        for upstream in &desc.follows {
            if !seen.contains(upstream.as_str()) {
                return Err(RunnelError::config(format!(
                    "task '{}' follows unknown task '{}'",
                    desc.name, upstream
                )));
            }
        }
    }
    Ok(())
}

/// Expand every descriptor. Transforms go last so they can match the
/// declared outputs of everything expanded before them.
fn expand_all(
    params: &ParameterStore,
    descriptors: &[TaskDescriptor],
) -> Result<Vec<Vec<TaskInstance>>> {
    let mut expanded: Vec<Vec<TaskInstance>> = vec![Vec::new(); descriptors.len()];
    let mut declared: Vec<PathBuf> = Vec::new();

    let plain = descriptors.iter().enumerate().filter(|(_, d)| !d.is_transform());
    let transforms = descriptors.iter().enumerate().filter(|(_, d)| d.is_transform());

    for (index, desc) in plain.chain(transforms) {
        let bindings = bindings_for(desc, params, &declared)?;
        let instances = expand(desc, &bindings, params)?;
        for instance in &instances {
            declared.extend(instance.outputs.iter().cloned());
        }
        expanded[index] = instances;
    }

    Ok(expanded)
}

fn check_collisions(instances: &[TaskInstance]) -> Result<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    for instance in instances {
        for output in &instance.outputs {
            if let Some(first) = owners.insert(normalize(output), &instance.id) {
                return Err(RunnelError::OutputCollision {
                    path: output.clone(),
                    first: first.to_string(),
                    second: instance.id.clone(),
                });
            }
        }
    }
    Ok(())
}

fn add_follows_edges(
    descriptors: &[TaskDescriptor],
    instances: &[TaskInstance],
    deps: &mut DependencyGraph,
    kinds: &mut HashMap<(usize, usize), EdgeKind>,
) {
    let mut by_task: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, instance) in instances.iter().enumerate() {
        by_task.entry(instance.task.as_str()).or_default().push(index);
    }

    for desc in descriptors {
        let consumers = by_task.get(desc.name.as_str()).cloned().unwrap_or_default();
        for upstream in &desc.follows {
            let producers = by_task.get(upstream.as_str()).cloned().unwrap_or_default();
            for &consumer in &consumers {
                for &producer in &producers {
                    deps.add_edge(producer, consumer);
                    kinds.insert((producer, consumer), EdgeKind::Follows);
                }
            }
        }
    }
}

/// Link consumers to producers by pattern and resolve every input pattern to
/// concrete paths: declared outputs in producer order, then files on disk.
fn add_inferred_edges(
    instances: &mut [TaskInstance],
    deps: &mut DependencyGraph,
    kinds: &mut HashMap<(usize, usize), EdgeKind>,
) {
    for consumer in 0..instances.len() {
        let own: HashSet<String> = instances[consumer]
            .outputs
            .iter()
            .map(|o| normalize(o))
            .collect();
        let mut resolved: Vec<PathBuf> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for pattern in instances[consumer].patterns() {
            for (producer, candidate) in instances.iter().enumerate() {
                if producer == consumer {
                    continue;
                }
                for output in &candidate.outputs {
                    if pattern.matches(output) {
                        kinds
                            .entry((producer, consumer))
                            .or_insert(EdgeKind::Inferred);
                        deps.add_edge(producer, consumer);
                        if seen.insert(normalize(output)) {
                            resolved.push(output.clone());
                        }
                    }
                }
            }

            for path in resolve_pattern_locally(&pattern) {
                let key = normalize(&path);
                if !own.contains(&key) && seen.insert(key) {
                    resolved.push(path);
                }
            }
        }

        instances[consumer].inputs = resolved;
    }
}

fn resolve_pattern_locally(pattern: &PathPattern) -> Vec<PathBuf> {
    match pattern.literal_path() {
        Some(path) => vec![path],
        None => pattern.expand_on_disk(),
    }
}

/// Task instances and the dependency edges between them.
#[derive(Debug, Clone)]
pub struct Graph {
    tasks: Vec<String>,
    descriptions: Vec<Option<String>>,
    instances: Vec<TaskInstance>,
    deps: DependencyGraph,
    kinds: HashMap<(usize, usize), EdgeKind>,
    order: Vec<usize>,
}

impl Graph {
    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the graph has no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// All instances, in declaration order.
    pub fn instances(&self) -> &[TaskInstance] {
        &self.instances
    }

    /// One instance.
    pub fn instance(&self, index: usize) -> &TaskInstance {
        &self.instances[index]
    }

    /// Index of the instance with the given id.
    pub fn find(&self, id: &str) -> Option<usize> {
        self.instances.iter().position(|i| i.id == id)
    }

    /// Declared task names, in declaration order.
    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Description of a declared task.
    pub fn description(&self, task: &str) -> Option<&str> {
        self.tasks
            .iter()
            .position(|t| t == task)
            .and_then(|i| self.descriptions[i].as_deref())
    }

    /// Indices of a task's instances, in binding order.
    pub fn instances_of(&self, task: &str) -> Vec<usize> {
        self.instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.task == task)
            .map(|(index, _)| index)
            .collect()
    }

    /// The underlying dependency structure.
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.deps
    }

    /// Direct prerequisites of an instance.
    pub fn dependencies_of(&self, index: usize) -> &BTreeSet<usize> {
        self.deps.dependencies_of(index)
    }

    /// Instances with a command but nothing to compare timestamps against.
    ///
    /// These never become up to date.
    pub fn always_stale(&self) -> Vec<&str> {
        self.instances
            .iter()
            .enumerate()
            .filter(|(index, instance)| {
                instance.command.is_some()
                    && instance.outputs.is_empty()
                    && instance.inputs.is_empty()
                    && self.deps.dependencies_of(*index).is_empty()
            })
            .map(|(_, instance)| instance.id.as_str())
            .collect()
    }

    /// Direct consumers of an instance.
    pub fn dependents_of(&self, index: usize) -> &BTreeSet<usize> {
        self.deps.dependents_of(index)
    }

    /// How the edge `producer -> consumer` was derived.
    pub fn edge_kind(&self, producer: usize, consumer: usize) -> Option<EdgeKind> {
        self.kinds.get(&(producer, consumer)).copied()
    }

    /// Topological order, ties broken by declaration order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Instance ids in topological order.
    pub fn order_ids(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.instances[i].id.as_str()).collect()
    }

    /// Instance ids grouped into stages that could run concurrently.
    pub fn stages(&self) -> Vec<Vec<&str>> {
        self.deps
            .parallel_groups()
            .unwrap_or_default()
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|i| self.instances[i].id.as_str())
                    .collect()
            })
            .collect()
    }

    /// Tasks none of whose instances feed an instance of another task.
    pub fn terminal_tasks(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|task| {
                self.instances_of(task).iter().all(|&i| {
                    self.deps
                        .dependents_of(i)
                        .iter()
                        .all(|&d| &self.instances[d].task == *task)
                })
            })
            .cloned()
            .collect()
    }

    /// Restrict the graph to the named tasks and everything they depend on.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a target is not a declared task.
    pub fn select<S: AsRef<str>>(&self, targets: &[S]) -> Result<Graph> {
        let mut keep = BTreeSet::new();
        for target in targets {
            let target = target.as_ref();
            if !self.tasks.iter().any(|t| t == target) {
                return Err(RunnelError::config(format!("unknown target '{}'", target)));
            }
            for index in self.instances_of(target) {
                keep.insert(index);
                keep.extend(self.deps.transitive_dependencies(index));
            }
        }

        let (deps, mapping) = self.deps.induced(&keep);
        let mut new_index = HashMap::new();
        for (new, &old) in mapping.iter().enumerate() {
            new_index.insert(old, new);
        }

        let kinds = self
            .kinds
            .iter()
            .filter_map(|(&(p, c), &kind)| {
                Some(((*new_index.get(&p)?, *new_index.get(&c)?), kind))
            })
            .collect();
        let order = deps
            .topological_order()
            .ok_or_else(|| RunnelError::config("task graph is not acyclic"))?;

        let kept_tasks: HashSet<&str> = mapping
            .iter()
            .map(|&i| self.instances[i].task.as_str())
            .collect();
        let (tasks, descriptions): (Vec<String>, Vec<Option<String>>) = self
            .tasks
            .iter()
            .zip(&self.descriptions)
            .filter(|(t, _)| kept_tasks.contains(t.as_str()))
            .map(|(t, d)| (t.clone(), d.clone()))
            .unzip();

        Ok(Graph {
            tasks,
            descriptions,
            instances: mapping.iter().map(|&i| self.instances[i].clone()).collect(),
            deps,
            kinds,
            order,
        })
    }
}
