//! Command implementations for the CLI.

mod info;
mod reporter;
mod run;
mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use taskkit_core::{Error, ProjectConfig, Registry};
use tracing::debug;

use crate::formatting::print_error;

pub use info::{cmd_graph, cmd_list, cmd_validate};
pub use run::cmd_run;

/// A loaded config together with the registry built from it.
struct Project {
    config: ProjectConfig,
    registry: Arc<Registry>,
}

fn load_project(config_path: &Path) -> Result<Project> {
    let config = ProjectConfig::load(config_path)?;
    let registry = config
        .to_registry()
        .with_context(|| format!("Failed to register tasks from {}", config_path.display()))?;
    debug!(
        config = %config_path.display(),
        tasks = registry.len(),
        "loaded project"
    );

    Ok(Project {
        config,
        registry: Arc::new(registry),
    })
}

/// Process exit code for a failed command.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    let code = error
        .downcast_ref::<Error>()
        .map(Error::exit_code)
        .unwrap_or(1);
    u8::try_from(code).unwrap_or(1)
}

/// Prints the failing task and the full cause chain.
pub fn print_failure(error: &anyhow::Error) {
    eprintln!();
    print_error(&error.to_string());

    if let Some(task) = error.downcast_ref::<Error>().and_then(Error::failing_task) {
        eprintln!("  {} {}", "Task".bright_black().bold(), task.bold());
    }

    for cause in error.chain().skip(1) {
        eprintln!("    caused by: {}", cause);
    }
}
