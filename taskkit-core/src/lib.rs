//! Core library for build-task orchestration.
//!
//! Tasks are registered once into an immutable [`Registry`], run in
//! dependency order by the [`Executor`], chained by release [`Pipeline`]s and
//! re-run on file changes by the [`WatchLoop`].

pub mod command_validator;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod ops;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod release;
pub mod reload;
pub mod reporter;
pub mod task;
pub mod watch;
pub mod watcher;

pub use config::{ProjectConfig, ReloadConfig};
pub use error::{BoxError, Error, Result};
pub use executor::Executor;
pub use graph::TaskGraph;
pub use outcome::{exit_code, Outcome, RunReport, TaskRecord};
pub use pipeline::Pipeline;
pub use registry::{Registry, RegistryBuilder};
pub use release::BumpType;
pub use reload::{ReloadHub, ReloadSignal};
pub use reporter::{RunReporter, TracingReporter};
pub use task::{from_async_fn, from_fn, Dep, Operation, RunOptions, TaskBody, TaskContext, TaskId};
pub use watch::{Reaction, WatchBinding, WatchLoop};
pub use watcher::{ChangeEvent, WatcherConfig};
