//! Terminal reporter for runs and watch mode.

use std::path::PathBuf;
use std::time::Duration;

use owo_colors::OwoColorize;
use taskkit_core::RunReporter;

use crate::formatting::{format_duration, print_error, print_info, print_success, print_warning, Status};

/// Prints run progress with the shared CLI formatting.
pub struct CliReporter;

fn cause_message(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message = format!("{}: {}", message, cause);
        source = cause.source();
    }
    message
}

impl RunReporter for CliReporter {
    fn task_started(&self, task: &str) {
        print_info(&format!("Starting '{}'", task));
    }

    fn task_finished(&self, task: &str, duration: Duration) {
        print_success(&format!(
            "Finished '{}' after {}",
            task,
            format_duration(duration)
        ));
    }

    fn task_failed(&self, task: &str, error: &(dyn std::error::Error + 'static)) {
        print_error(&format!("'{}' errored: {}", task, cause_message(error)));
    }

    fn task_output(&self, task: &str, line: &str, is_stderr: bool) {
        let prefix = format!("[{}]", task);
        if is_stderr {
            eprintln!("  {} {}", prefix.bright_black().bold(), line.bright_red());
        } else {
            println!("  {} {}", prefix.bright_black().bold(), line);
        }
    }

    fn version_bumped(&self, file: &str, old: &str, new: &str) {
        print_success(&format!("Bumped {} from {} to {}", file, old, new));
    }

    fn watch_triggered(&self, binding: &str, paths: &[PathBuf]) {
        let changed = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!();
        print_warning(&format!("Changed {} ({})", changed, binding));
    }

    fn watch_run_failed(&self, binding: &str, error: &(dyn std::error::Error + 'static)) {
        print_error(&format!("{} (still watching {})", cause_message(error), binding));
    }

    fn reload_sent(&self, observers: usize) {
        println!(
            "  {} Reload sent to {} {}",
            Status::Info.colored_symbol(),
            observers.to_string().bold().cyan(),
            if observers == 1 { "observer" } else { "observers" }
        );
    }
}
