//! The Scheduler/Executor.
//!
//! Walks a [`Graph`] in topological order. Every instance whose prerequisites
//! have all reached a terminal state is decided: skipped when up to date,
//! marked not-run when a prerequisite did not succeed, or dispatched to a
//! bounded pool of workers that each block on one [`JobRunner`] call.
//!
//! The scheduling loop runs on the calling thread and owns all state; workers
//! only receive [`Job`]s and send back results over `crossbeam-channel`s.
//! A failure never aborts independent branches.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::runner::builder::Graph;
use crate::runner::freshness::{self, Freshness, Upstream};
use crate::runner::report::{InstanceOutcome, InstanceState, RunReport};
use crate::shell::{stderr_tail, CancelFlag, Job, JobOutput, JobRunner};
use crate::tasks::TaskInstance;

/// Options for one scheduler run.
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    /// Maximum number of concurrently running jobs (at least 1).
    pub jobs: usize,

    /// Decide staleness and report the order without starting processes.
    pub dry_run: bool,

    /// Tasks whose instances run regardless of timestamps.
    pub force: HashSet<String>,

    /// Checked before every dispatch.
    pub cancel: CancelFlag,

    /// Directory for per-instance job logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            dry_run: false,
            force: HashSet::new(),
            cancel: CancelFlag::new(),
            log_dir: None,
        }
    }
}

/// Progress events emitted while running.
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// An instance was handed to a worker.
    Started { instance: &'a TaskInstance },
    /// An instance reached a terminal state.
    Finished { outcome: &'a InstanceOutcome },
}

/// Drives a graph to completion.
pub struct Scheduler<'r> {
    runner: &'r dyn JobRunner,
    options: ScheduleOptions,
}

impl<'r> Scheduler<'r> {
    /// Create a scheduler over a job runner.
    pub fn new(runner: &'r dyn JobRunner, options: ScheduleOptions) -> Self {
        Self { runner, options }
    }

    /// The options this scheduler runs with.
    pub fn options(&self) -> &ScheduleOptions {
        &self.options
    }

    /// Run every instance of the graph.
    pub fn run(&self, graph: &Graph) -> RunReport {
        self.run_with_progress(graph, &mut |_| {})
    }

    /// Run every instance of the graph, reporting progress.
    pub fn run_with_progress(
        &self,
        graph: &Graph,
        on_event: &mut dyn FnMut(RunEvent<'_>),
    ) -> RunReport {
        let workers = if self.options.dry_run {
            0
        } else {
            self.options.jobs.max(1).min(graph.len())
        };

        let mut run = RunState::new(graph, &self.options);

        thread::scope(|scope| {
            let (job_tx, job_rx) = unbounded::<(usize, Job)>();
            let (done_tx, done_rx) = unbounded::<(usize, Result<JobOutput>)>();

            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let runner = self.runner;
                scope.spawn(move || worker(runner, job_rx, done_tx));
            }
            drop(done_tx);

            run.drive(&job_tx, &done_rx, on_event);
            drop(job_tx);
        });

        run.into_report(graph)
    }
}

fn worker(
    runner: &dyn JobRunner,
    jobs: Receiver<(usize, Job)>,
    done: Sender<(usize, Result<JobOutput>)>,
) {
    for (index, job) in jobs.iter() {
        let result = runner.execute(&job);
        if done.send((index, result)).is_err() {
            break;
        }
    }
}

/// Mutable state of one run, owned by the scheduling loop.
struct RunState<'g> {
    graph: &'g Graph,
    options: &'g ScheduleOptions,
    outcomes: Vec<InstanceOutcome>,
    /// Position of each instance in the topological order.
    position: Vec<usize>,
    /// Prerequisites not yet terminal.
    remaining: Vec<usize>,
    /// Prerequisites terminal, not yet decided.
    ready: BinaryHeap<Reverse<(usize, usize)>>,
    /// Stale and waiting for a worker.
    dispatchable: BinaryHeap<Reverse<(usize, usize)>>,
    running: usize,
    cancelled: bool,
}

impl<'g> RunState<'g> {
    fn new(graph: &'g Graph, options: &'g ScheduleOptions) -> Self {
        let mut position = vec![0; graph.len()];
        for (pos, &index) in graph.order().iter().enumerate() {
            position[index] = pos;
        }

        let remaining: Vec<usize> = (0..graph.len())
            .map(|i| graph.dependencies_of(i).len())
            .collect();

        let ready = (0..graph.len())
            .filter(|&i| remaining[i] == 0)
            .map(|i| Reverse((position[i], i)))
            .collect();

        let outcomes = graph
            .instances()
            .iter()
            .map(|i| {
                let mut outcome = InstanceOutcome::pending(&i.id, &i.task);
                outcome.command = i.command.as_ref().map(|c| c.display_line());
                outcome
            })
            .collect();

        Self {
            graph,
            options,
            outcomes,
            position,
            remaining,
            ready,
            dispatchable: BinaryHeap::new(),
            running: 0,
            cancelled: false,
        }
    }

    fn drive(
        &mut self,
        jobs: &Sender<(usize, Job)>,
        done: &Receiver<(usize, Result<JobOutput>)>,
        on_event: &mut dyn FnMut(RunEvent<'_>),
    ) {
        loop {
            while let Some(Reverse((_, index))) = self.ready.pop() {
                self.decide(index, on_event);
            }

            while self.running < self.options.jobs.max(1) {
                let Some(Reverse((_, index))) = self.dispatchable.pop() else {
                    break;
                };
                self.dispatch(index, jobs, on_event);
            }

            if !self.ready.is_empty() {
                continue;
            }
            if self.running == 0 {
                break;
            }

            match done.recv() {
                Ok((index, result)) => {
                    self.running -= 1;
                    self.complete(index, result, on_event);
                }
                Err(_) => {
                    error!("All workers exited with {} job(s) outstanding", self.running);
                    break;
                }
            }
        }
    }

    fn is_cancelled(&mut self) -> bool {
        if !self.cancelled && self.options.cancel.is_cancelled() {
            warn!("Run cancelled; no further instances will be started");
            self.cancelled = true;
        }
        self.cancelled
    }

    /// Decide an instance whose prerequisites are all terminal.
    fn decide(&mut self, index: usize, on_event: &mut dyn FnMut(RunEvent<'_>)) {
        let graph = self.graph;
        let prerequisites = graph.dependencies_of(index);

        if let Some(&blocker) = prerequisites
            .iter()
            .find(|&&p| !self.outcomes[p].state.unblocks_dependents())
        {
            let message = format!(
                "prerequisite '{}' {}",
                graph.instance(blocker).id,
                self.outcomes[blocker].state
            );
            debug!("Not running {}: {}", graph.instance(index).id, message);
            self.finish(index, InstanceState::NotRun, Some(message), on_event);
            return;
        }

        if self.is_cancelled() {
            let message = Some("cancelled".to_string());
            self.finish(index, InstanceState::NotRun, message, on_event);
            return;
        }

        let instance = graph.instance(index);
        let upstream = Upstream {
            has_prerequisites: !prerequisites.is_empty(),
            ran: prerequisites.iter().any(|&p| self.outcomes[p].state.ran()),
            forced: self.options.force.contains(&instance.task),
        };

        match freshness::check(instance, upstream) {
            Freshness::UpToDate => {
                debug!("{} is up to date", instance.id);
                self.finish(index, InstanceState::SkippedUpToDate, None, on_event);
            }
            Freshness::Stale(reason) => {
                debug!("{} is stale: {}", instance.id, reason);
                self.outcomes[index].stale = Some(reason);
                if self.options.dry_run {
                    self.finish(index, InstanceState::WouldRun, None, on_event);
                } else if instance.command.is_none() {
                    self.finish(index, InstanceState::Succeeded, None, on_event);
                } else {
                    self.outcomes[index].state = InstanceState::Ready;
                    self.dispatchable.push(Reverse((self.position[index], index)));
                }
            }
        }
    }

    fn dispatch(
        &mut self,
        index: usize,
        jobs: &Sender<(usize, Job)>,
        on_event: &mut dyn FnMut(RunEvent<'_>),
    ) {
        if self.is_cancelled() {
            let message = Some("cancelled".to_string());
            self.finish(index, InstanceState::NotRun, message, on_event);
            return;
        }

        let graph = self.graph;
        let instance = graph.instance(index);
        let Some(command) = instance.command.clone() else {
            self.finish(index, InstanceState::Succeeded, None, on_event);
            return;
        };

        if let Some(dir) = &instance.mkdir {
            if let Err(e) = fs::create_dir_all(dir) {
                let message = format!("cannot create directory {}: {}", dir.display(), e);
                error!("{} failed: {}", instance.id, message);
                self.finish(index, InstanceState::Failed, Some(message), on_event);
                return;
            }
        }

        let job = Job {
            id: instance.id.clone(),
            command,
            outputs: instance.outputs.clone(),
            log_path: self
                .options
                .log_dir
                .as_ref()
                .map(|dir| dir.join(format!("{}.log", instance.slug()))),
        };

        debug!("Dispatching {}: {}", instance.id, job.command.display_line());
        if jobs.send((index, job)).is_err() {
            let message = "no worker available".to_string();
            self.finish(index, InstanceState::Failed, Some(message), on_event);
            return;
        }

        self.outcomes[index].state = InstanceState::Running;
        self.running += 1;
        on_event(RunEvent::Started { instance });
    }

    fn complete(
        &mut self,
        index: usize,
        result: Result<JobOutput>,
        on_event: &mut dyn FnMut(RunEvent<'_>),
    ) {
        let graph = self.graph;
        let id = &graph.instance(index).id;
        match result {
            Ok(output) => {
                self.outcomes[index].exit_code = output.exit_code;
                self.outcomes[index].duration = Some(output.duration);
                match output.to_error(id) {
                    None => {
                        info!("{} succeeded in {:.1}s", id, output.duration.as_secs_f64());
                        self.finish(index, InstanceState::Succeeded, None, on_event);
                    }
                    Some(err) => {
                        error!("{}", err);
                        let tail = stderr_tail(&output.stderr, 1);
                        let message = match (output.exit_code, tail.is_empty()) {
                            (Some(code), true) => format!("exit code {}", code),
                            (Some(code), false) => format!("exit code {}: {}", code, tail),
                            (None, _) => "terminated by signal".to_string(),
                        };
                        self.discard_outputs(index);
                        self.finish(index, InstanceState::Failed, Some(message), on_event);
                    }
                }
            }
            Err(e) => {
                error!("{} could not run: {}", id, e);
                self.outcomes[index].duration = Some(Duration::ZERO);
                self.discard_outputs(index);
                self.finish(index, InstanceState::Failed, Some(e.to_string()), on_event);
            }
        }
    }

    /// Remove whatever a failed job left behind so the next run retries it.
    fn discard_outputs(&self, index: usize) {
        let instance = self.graph.instance(index);
        for output in &instance.outputs {
            match fs::remove_file(output) {
                Ok(()) => warn!("Removing output {} of failed {}", output.display(), instance.id),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Could not remove output {} of failed {}: {}",
                    output.display(),
                    instance.id,
                    e
                ),
            }
        }
    }

    /// Record a terminal state and release dependents whose prerequisites are
    /// now all terminal.
    fn finish(
        &mut self,
        index: usize,
        state: InstanceState,
        error: Option<String>,
        on_event: &mut dyn FnMut(RunEvent<'_>),
    ) {
        self.outcomes[index].state = state;
        self.outcomes[index].error = error;
        on_event(RunEvent::Finished {
            outcome: &self.outcomes[index],
        });

        let graph = self.graph;
        for &dependent in graph.dependents_of(index) {
            self.remaining[dependent] -= 1;
            if self.remaining[dependent] == 0 {
                self.ready.push(Reverse((self.position[dependent], dependent)));
            }
        }
    }

    fn into_report(mut self, graph: &Graph) -> RunReport {
        for outcome in &mut self.outcomes {
            if !outcome.state.is_terminal() {
                outcome.state = InstanceState::NotRun;
            }
        }

        let mut outcomes: Vec<Option<InstanceOutcome>> =
            self.outcomes.into_iter().map(Some).collect();

        RunReport {
            order: graph.order_ids().into_iter().map(String::from).collect(),
            outcomes: graph
                .order()
                .iter()
                .filter_map(|&i| outcomes[i].take())
                .collect(),
            dry_run: self.options.dry_run,
            cancelled: self.cancelled,
        }
    }
}
