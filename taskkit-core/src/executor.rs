//! Dependency-ordered task execution.

use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::outcome::{Outcome, RunReport};
use crate::registry::Registry;
use crate::reporter::{RunReporter, TracingReporter};
use crate::task::{RunOptions, TaskBody, TaskContext, TaskId};

/// Computes the execution order for `root`: every dependency strictly before
/// its dependents, siblings in declaration order, each task once.
///
/// Pipeline steps reachable from `root` are walked as well so that a pipeline
/// which reaches itself is rejected before anything runs. They do not take
/// part in the order.
///
/// # Errors
///
/// Returns [`Error::CyclicDependency`] naming the cycle if one is reachable.
pub fn build_task_order(registry: &Registry, root: TaskId) -> Result<Vec<TaskId>> {
    let mut order = Vec::new();
    Walker::new(registry, false).visit(root, &mut order)?;
    Walker::new(registry, true).visit(root, &mut Vec::new())?;
    Ok(order)
}

struct Walker<'a> {
    registry: &'a Registry,
    include_steps: bool,
    visiting: FxHashSet<TaskId>,
    done: FxHashSet<TaskId>,
    path: Vec<TaskId>,
}

impl<'a> Walker<'a> {
    fn new(registry: &'a Registry, include_steps: bool) -> Self {
        Self {
            registry,
            include_steps,
            visiting: FxHashSet::default(),
            done: FxHashSet::default(),
            path: Vec::new(),
        }
    }

    fn visit(&mut self, id: TaskId, order: &mut Vec<TaskId>) -> Result<()> {
        if self.visiting.contains(&id) {
            return Err(self.cycle_error(id));
        }

        if self.done.contains(&id) {
            return Ok(());
        }

        self.visiting.insert(id);
        self.path.push(id);

        let task = self.registry.task(id);
        for dep in task.deps() {
            self.visit(*dep, order)?;
        }
        if self.include_steps {
            for step in task.pipeline_steps() {
                self.visit(*step, order)?;
            }
        }

        self.path.pop();
        self.visiting.remove(&id);
        self.done.insert(id);
        order.push(id);

        Ok(())
    }

    fn cycle_error(&self, id: TaskId) -> Error {
        let start = self.path.iter().position(|p| *p == id).unwrap_or(0);
        let cycle = self.path[start..]
            .iter()
            .chain(std::iter::once(&id))
            .map(|t| self.registry.name(*t))
            .collect::<Vec<_>>()
            .join(" -> ");
        Error::CyclicDependency { cycle }
    }
}

/// Runs tasks and their dependencies, one at a time.
pub struct Executor {
    registry: Arc<Registry>,
    options: RunOptions,
    reporter: Arc<dyn RunReporter>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            options: RunOptions::default(),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn RunReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[inline]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    #[inline]
    pub fn reporter(&self) -> &Arc<dyn RunReporter> {
        &self.reporter
    }

    /// Returns the order in which `run(id)` would execute tasks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] if a cycle is reachable from `id`.
    pub fn plan(&self, id: TaskId) -> Result<Vec<TaskId>> {
        build_task_order(&self.registry, id)
    }

    /// Runs the task called `name` with all of its dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTask`] without running anything if no task has
    /// that name, otherwise the errors of [`Executor::run`].
    pub async fn run_named(&self, name: &str) -> Outcome {
        let id = self.registry.lookup(name)?;
        self.run(id).await
    }

    /// Runs a task with all of its dependencies.
    ///
    /// Each task executes at most once per call, after all of its
    /// dependencies. Nothing is cached between calls. The first failure
    /// aborts the rest of the order; completed tasks are not undone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] before running anything if the
    /// graph has a reachable cycle, [`Error::TaskFailed`] when an operation
    /// fails, and [`Error::PipelineFailed`] when a pipeline body fails.
    pub fn run(&self, id: TaskId) -> BoxFuture<'_, Outcome> {
        async move {
            let order = self.plan(id)?;
            debug!(
                task = self.registry.name(id),
                order = ?order.iter().map(|t| self.registry.name(*t)).collect::<Vec<_>>(),
                "resolved execution order"
            );

            let mut report = RunReport::default();
            for task_id in order {
                self.execute_one(task_id, &mut report).await?;
            }
            Ok(report)
        }
        .boxed()
    }

    async fn execute_one(&self, id: TaskId, report: &mut RunReport) -> Result<()> {
        let task = self.registry.task(id);
        let name = task.name();

        match task.body() {
            TaskBody::Group => {
                report.push(name, Default::default());
                Ok(())
            }
            TaskBody::Operation(operation) => {
                self.reporter.task_started(name);
                let start = Instant::now();
                let ctx = TaskContext::new(name, &self.options, self.reporter.as_ref());

                match operation.run(&ctx).await {
                    Ok(()) => {
                        let elapsed = start.elapsed();
                        self.reporter.task_finished(name, elapsed);
                        report.push(name, elapsed);
                        Ok(())
                    }
                    Err(cause) => {
                        self.reporter.task_failed(name, cause.as_ref());
                        Err(Error::TaskFailed {
                            task: name.to_string(),
                            cause,
                        })
                    }
                }
            }
            TaskBody::Pipeline(pipeline) => {
                self.reporter.task_started(name);
                let start = Instant::now();

                match pipeline.run(self).await {
                    Ok(nested) => {
                        let elapsed = start.elapsed();
                        report.extend(nested);
                        self.reporter.task_finished(name, elapsed);
                        report.push(name, elapsed);
                        Ok(())
                    }
                    Err(error) => {
                        self.reporter.task_failed(name, &error);
                        Err(error)
                    }
                }
            }
        }
    }
}
