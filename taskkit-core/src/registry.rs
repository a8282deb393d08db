//! Task registration and lookup.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::task::{Dep, Operation, TaskBody, TaskDef, TaskId};

enum PendingBody {
    Operation(Arc<dyn Operation>),
    Pipeline(Vec<Dep>),
    Group,
}

struct PendingTask {
    name: String,
    deps: Vec<Dep>,
    body: PendingBody,
}

/// Collects task declarations before the first run.
///
/// The builder is consumed by [`RegistryBuilder::build`], so a [`Registry`]
/// can never change once tasks start running.
#[derive(Default)]
pub struct RegistryBuilder {
    tasks: Vec<PendingTask>,
    index: HashMap<String, TaskId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task backed by an operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if `name` is already registered.
    pub fn register<I, D>(
        &mut self,
        name: impl Into<String>,
        deps: I,
        operation: Arc<dyn Operation>,
    ) -> Result<TaskId>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dep>,
    {
        self.push(name.into(), collect_deps(deps), PendingBody::Operation(operation))
    }

    /// Registers a task that only aggregates its dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if `name` is already registered.
    pub fn register_group<I, D>(&mut self, name: impl Into<String>, deps: I) -> Result<TaskId>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dep>,
    {
        self.push(name.into(), collect_deps(deps), PendingBody::Group)
    }

    /// Registers a task whose body is an ordered pipeline of other tasks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTask`] if `name` is already registered.
    pub fn register_pipeline<I, D>(&mut self, name: impl Into<String>, steps: I) -> Result<TaskId>
    where
        I: IntoIterator<Item = D>,
        D: Into<Dep>,
    {
        self.push(
            name.into(),
            Vec::new(),
            PendingBody::Pipeline(collect_deps(steps)),
        )
    }

    fn push(&mut self, name: String, deps: Vec<Dep>, body: PendingBody) -> Result<TaskId> {
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateTask { name });
        }

        let id = TaskId(self.tasks.len());
        debug!(task = %name, %id, "registered task");
        self.index.insert(name.clone(), id);
        self.tasks.push(PendingTask { name, deps, body });
        Ok(id)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Seals the builder, resolving every dependency reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTask`] if a dependency or pipeline step names a
    /// task that was never registered.
    pub fn build(self) -> Result<Registry> {
        let available = available_names(self.tasks.iter().map(|t| t.name.as_str()));
        let mut tasks = Vec::with_capacity(self.tasks.len());

        for (idx, pending) in self.tasks.iter().enumerate() {
            let resolve = |dep: &Dep| -> Result<TaskId> {
                match dep {
                    Dep::Id(id) if id.0 < self.tasks.len() => Ok(*id),
                    Dep::Id(id) => Err(Error::UnknownTask {
                        name: id.to_string(),
                        required_by: Some(pending.name.clone()),
                        available: available.clone(),
                    }),
                    Dep::Name(name) => {
                        self.index
                            .get(name)
                            .copied()
                            .ok_or_else(|| Error::UnknownTask {
                                name: name.clone(),
                                required_by: Some(pending.name.clone()),
                                available: available.clone(),
                            })
                    }
                }
            };

            let deps = pending
                .deps
                .iter()
                .map(resolve)
                .collect::<Result<SmallVec<[TaskId; 4]>>>()?;

            let body = match &pending.body {
                PendingBody::Operation(op) => TaskBody::Operation(Arc::clone(op)),
                PendingBody::Pipeline(steps) => {
                    let steps = steps.iter().map(resolve).collect::<Result<Vec<_>>>()?;
                    TaskBody::Pipeline(Pipeline::new(steps))
                }
                PendingBody::Group => TaskBody::Group,
            };

            tasks.push(TaskDef {
                id: TaskId(idx),
                name: pending.name.clone(),
                deps,
                body,
            });
        }

        Ok(Registry {
            tasks,
            index: self.index,
        })
    }
}

fn collect_deps<I, D>(deps: I) -> Vec<Dep>
where
    I: IntoIterator<Item = D>,
    D: Into<Dep>,
{
    deps.into_iter().map(Into::into).collect()
}

fn available_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Immutable set of tasks, looked up by name or handle.
#[derive(Debug)]
pub struct Registry {
    tasks: Vec<TaskDef>,
    index: HashMap<String, TaskId>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks a task up by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTask`] if no task has that name.
    pub fn lookup(&self, name: &str) -> Result<TaskId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTask {
                name: name.to_string(),
                required_by: None,
                available: available_names(self.names()),
            })
    }

    /// Returns the task behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different registry.
    #[inline]
    pub fn task(&self, id: TaskId) -> &TaskDef {
        &self.tasks[id.0]
    }

    #[inline]
    pub fn get(&self, id: TaskId) -> Option<&TaskDef> {
        self.tasks.get(id.0)
    }

    #[inline]
    pub fn name(&self, id: TaskId) -> &str {
        &self.tasks[id.0].name
    }

    /// Task names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> &[TaskDef] {
        &self.tasks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
