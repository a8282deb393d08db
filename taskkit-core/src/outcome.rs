//! Run outcomes and their mapping to process exit codes.

use std::time::Duration;

use crate::error::{Error, Result};

/// A task body that completed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub name: String,
    pub duration: Duration,
}

/// Tasks executed by a successful run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub records: Vec<TaskRecord>,
}

impl RunReport {
    pub(crate) fn push(&mut self, name: impl Into<String>, duration: Duration) {
        self.records.push(TaskRecord {
            name: name.into(),
            duration,
        });
    }

    pub(crate) fn extend(&mut self, other: RunReport) {
        self.records.extend(other.records);
    }

    /// Names of executed tasks, in order.
    pub fn executed(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.records.iter().map(|r| r.duration).sum()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of a top-level run or pipeline.
pub type Outcome = Result<RunReport>;

/// Maps an outcome to a process exit code: 0 on success, non-zero otherwise.
pub fn exit_code(outcome: &Outcome) -> i32 {
    match outcome {
        Ok(_) => 0,
        Err(error) => error.exit_code(),
    }
}

/// Walks the `source()` chain of an error, outermost first.
pub fn cause_chain(error: &Error) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}
