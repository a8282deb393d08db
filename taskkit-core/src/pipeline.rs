//! Strictly ordered release pipelines.

use tracing::{debug, info};

use crate::error::Error;
use crate::executor::Executor;
use crate::outcome::{Outcome, RunReport};
use crate::task::TaskId;

/// A fixed sequence of tasks run one after another.
///
/// Unlike the dependency graph, the order here is authored rather than
/// derived, and a failure aborts every remaining step. Each step is a
/// separate [`Executor::run`], so a dependency shared by two steps runs once
/// per step. Nothing is rolled back on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<TaskId>,
}

impl Pipeline {
    pub fn new(steps: Vec<TaskId>) -> Self {
        Self { steps }
    }

    #[inline]
    pub fn steps(&self) -> &[TaskId] {
        &self.steps
    }

    /// Runs every step in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipelineFailed`] naming the first step that failed;
    /// no later step runs.
    pub async fn run(&self, executor: &Executor) -> Outcome {
        let registry = executor.registry();
        let mut report = RunReport::default();

        for (position, step) in self.steps.iter().enumerate() {
            let step_name = registry.name(*step);
            debug!(
                step = step_name,
                position = position + 1,
                total = self.steps.len(),
                "running pipeline step"
            );

            match executor.run(*step).await {
                Ok(step_report) => report.extend(step_report),
                Err(cause) => {
                    info!(
                        step = step_name,
                        skipped = self.steps.len() - position - 1,
                        "pipeline aborted"
                    );
                    return Err(Error::PipelineFailed {
                        step: step_name.to_string(),
                        cause: Box::new(cause),
                    });
                }
            }
        }

        Ok(report)
    }
}
