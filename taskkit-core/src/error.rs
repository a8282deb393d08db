//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by task operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Invalid config in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Task '{name}' is already registered")]
    DuplicateTask { name: String },

    #[error("{}", unknown_task_message(name, required_by.as_deref(), available))]
    UnknownTask {
        name: String,
        required_by: Option<String>,
        available: String,
    },

    #[error("Circular dependency detected: {cycle}. Use 'taskkit graph' to inspect dependencies.")]
    CyclicDependency { cycle: String },

    #[error("Task '{task}' failed")]
    TaskFailed {
        task: String,
        #[source]
        cause: BoxError,
    },

    #[error("Release pipeline stopped at step '{step}'")]
    PipelineFailed {
        step: String,
        #[source]
        cause: Box<Error>,
    },

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Release error: {0}")]
    Release(String),

    #[error("Operation error: {0}")]
    Operation(String),
}

fn unknown_task_message(name: &str, required_by: Option<&str>, available: &str) -> String {
    match required_by {
        Some(parent) => format!(
            "Task not found: {} (required by '{}'). Available tasks: {}",
            name, parent, available
        ),
        None => format!("Task not found: {}. Available tasks: {}", name, available),
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "taskkit.toml".to_string(),
        }
    }
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Configuration problems exit with 2, everything that happened while
    /// tasks were running exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::DuplicateTask { .. }
            | Error::UnknownTask { .. }
            | Error::CyclicDependency { .. }
            | Error::Config { .. }
            | Error::Toml { .. } => 2,
            _ => 1,
        }
    }

    /// Name of the task or pipeline step that triggered the failure, if any.
    pub fn failing_task(&self) -> Option<&str> {
        match self {
            Error::TaskFailed { task, .. } => Some(task),
            Error::PipelineFailed { step, .. } => Some(step),
            Error::UnknownTask { name, .. } => Some(name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
