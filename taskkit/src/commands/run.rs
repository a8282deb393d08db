//! Task execution command.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use taskkit_core::{BumpType, Executor, RunReport};
use tracing::info;

use crate::formatting::{format_duration, print_section_header, print_summary_box, SectionStyle};

use super::reporter::CliReporter;
use super::{load_project, watch};

pub fn cmd_run(config_path: &Path, task: &str, bump: BumpType, no_watch: bool) -> Result<()> {
    let project = load_project(config_path)?;
    let executor = Arc::new(
        Executor::new(Arc::clone(&project.registry))
            .with_options(project.config.run_options(bump))
            .with_reporter(Arc::new(CliReporter)),
    );
    let enter_watch = !no_watch && project.config.dev.as_deref() == Some(task);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(async {
        print_section_header(&format!("Running '{}'", task), SectionStyle::Primary);

        let start = Instant::now();
        let report = executor.run_named(task).await?;
        print_run_summary(task, &report, start.elapsed());

        if enter_watch {
            info!(task, "handing over to watch mode");
            watch::run_watch(&project, executor).await?;
        }

        Ok::<(), anyhow::Error>(())
    })
}

fn print_run_summary(task: &str, report: &RunReport, elapsed: std::time::Duration) {
    println!();
    print_summary_box(
        "Run Summary",
        &[
            ("Task", task),
            ("Executed", &report.len().to_string()),
            ("Duration", &format_duration(elapsed)),
        ],
    );
    println!();
}
