//! Task handles, bodies and the operation contract.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use smallvec::SmallVec;

use crate::error::BoxError;
use crate::pipeline::Pipeline;
use crate::release::BumpType;
use crate::reporter::RunReporter;

/// Strongly typed handle to a registered task.
///
/// Handles are only meaningful for the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dependency reference accepted at registration time.
///
/// Names are resolved to handles when the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dep {
    Id(TaskId),
    Name(String),
}

impl From<TaskId> for Dep {
    fn from(id: TaskId) -> Self {
        Dep::Id(id)
    }
}

impl From<&str> for Dep {
    fn from(name: &str) -> Self {
        Dep::Name(name.to_string())
    }
}

impl From<String> for Dep {
    fn from(name: String) -> Self {
        Dep::Name(name)
    }
}

impl From<&String> for Dep {
    fn from(name: &String) -> Self {
        Dep::Name(name.clone())
    }
}

/// Options shared by every task of a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory that relative task paths are resolved against.
    pub project_root: PathBuf,
    /// Requested version bump for release tasks.
    pub bump: BumpType,
    /// Manifest whose `version` field feeds `{version}` placeholders.
    pub version_file: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            bump: BumpType::Patch,
            version_file: PathBuf::from("package.json"),
        }
    }
}

/// Context handed to an operation while it runs.
pub struct TaskContext<'a> {
    pub(crate) task: &'a str,
    pub(crate) options: &'a RunOptions,
    pub(crate) reporter: &'a dyn RunReporter,
}

impl<'a> TaskContext<'a> {
    pub fn new(task: &'a str, options: &'a RunOptions, reporter: &'a dyn RunReporter) -> Self {
        Self {
            task,
            options,
            reporter,
        }
    }

    #[inline]
    pub fn task_name(&self) -> &str {
        self.task
    }

    #[inline]
    pub fn options(&self) -> &RunOptions {
        self.options
    }

    #[inline]
    pub fn reporter(&self) -> &dyn RunReporter {
        self.reporter
    }

    #[inline]
    pub fn project_root(&self) -> &Path {
        &self.options.project_root
    }

    /// Resolves a path relative to the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.options.project_root.join(path)
        }
    }
}

/// The unit of work behind a task.
///
/// Operations are opaque to the executor: it only awaits them and observes
/// success or failure.
#[async_trait]
pub trait Operation: Send + Sync {
    async fn run(&self, ctx: &TaskContext<'_>) -> Result<(), BoxError>;
}

/// Wraps a synchronous closure as an [`Operation`].
pub fn from_fn<F>(f: F) -> Arc<dyn Operation>
where
    F: Fn(&TaskContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(SyncOperation(f))
}

/// Wraps a closure returning a future as an [`Operation`].
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn Operation>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(AsyncOperation(f))
}

struct SyncOperation<F>(F);

#[async_trait]
impl<F> Operation for SyncOperation<F>
where
    F: Fn(&TaskContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    async fn run(&self, ctx: &TaskContext<'_>) -> Result<(), BoxError> {
        (self.0)(ctx)
    }
}

struct AsyncOperation<F>(F);

#[async_trait]
impl<F, Fut> Operation for AsyncOperation<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn run(&self, _ctx: &TaskContext<'_>) -> Result<(), BoxError> {
        (self.0)().await
    }
}

/// What a task does once its dependencies have completed.
#[derive(Clone)]
pub enum TaskBody {
    /// Runs an external operation.
    Operation(Arc<dyn Operation>),
    /// Runs an ordered release pipeline.
    Pipeline(Pipeline),
    /// Does nothing itself; exists to aggregate dependencies.
    Group,
}

impl TaskBody {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskBody::Operation(_) => "operation",
            TaskBody::Pipeline(_) => "pipeline",
            TaskBody::Group => "group",
        }
    }
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Operation(_) => f.write_str("Operation(..)"),
            TaskBody::Pipeline(p) => f.debug_tuple("Pipeline").field(p).finish(),
            TaskBody::Group => f.write_str("Group"),
        }
    }
}

/// A registered task.
#[derive(Debug, Clone)]
pub struct TaskDef {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) deps: SmallVec<[TaskId; 4]>,
    pub(crate) body: TaskBody,
}

impl TaskDef {
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependencies in declaration order.
    #[inline]
    pub fn deps(&self) -> &[TaskId] {
        &self.deps
    }

    #[inline]
    pub fn body(&self) -> &TaskBody {
        &self.body
    }

    /// Steps of a pipeline body, empty for other bodies.
    pub fn pipeline_steps(&self) -> &[TaskId] {
        match &self.body {
            TaskBody::Pipeline(pipeline) => pipeline.steps(),
            _ => &[],
        }
    }
}
