//! Trait for reporting run progress.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

/// Receives progress notifications from the executor, pipeline and watch loop.
///
/// This keeps the core library from writing to stdout/stderr directly. Every
/// method has an empty default so implementors only override what they show.
pub trait RunReporter: Send + Sync {
    /// A task's body is about to run.
    fn task_started(&self, _task: &str) {}

    /// A task's body completed successfully.
    fn task_finished(&self, _task: &str, _duration: Duration) {}

    /// A task's body failed; the run is about to abort.
    fn task_failed(&self, _task: &str, _error: &(dyn std::error::Error + 'static)) {}

    /// A line of output produced by a running task.
    fn task_output(&self, _task: &str, _line: &str, _is_stderr: bool) {}

    /// A manifest version was rewritten.
    ///
    /// * `file` - The manifest path
    /// * `old` - The version before the bump
    /// * `new` - The version after the bump
    fn version_bumped(&self, _file: &str, _old: &str, _new: &str) {}

    /// A watch binding was triggered by a change.
    fn watch_triggered(&self, _binding: &str, _paths: &[PathBuf]) {}

    /// A watch-triggered run failed. The watch loop keeps going.
    fn watch_run_failed(&self, _binding: &str, _error: &(dyn std::error::Error + 'static)) {}

    /// A reload signal was broadcast to `observers` connected observers.
    fn reload_sent(&self, _observers: usize) {}
}

/// Reporter that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn task_started(&self, task: &str) {
        info!(task, "starting");
    }

    fn task_finished(&self, task: &str, duration: Duration) {
        info!(task, elapsed_ms = duration.as_millis() as u64, "finished");
    }

    fn task_failed(&self, task: &str, error: &(dyn std::error::Error + 'static)) {
        warn!(task, %error, "failed");
    }

    fn task_output(&self, task: &str, line: &str, is_stderr: bool) {
        debug!(task, is_stderr, "{}", line);
    }

    fn version_bumped(&self, file: &str, old: &str, new: &str) {
        info!(file, old, new, "bumped version");
    }

    fn watch_triggered(&self, binding: &str, paths: &[PathBuf]) {
        debug!(binding, changed = paths.len(), "watch binding triggered");
    }

    fn watch_run_failed(&self, binding: &str, error: &(dyn std::error::Error + 'static)) {
        warn!(binding, %error, "watch-triggered run failed");
    }

    fn reload_sent(&self, observers: usize) {
        debug!(observers, "reload broadcast");
    }
}
