//! TOML configuration parsing for task definitions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::command_validator::CommandValidator;
use crate::error::{Error, Result};
use crate::ops::{BumpVersion, GitCommit, GitTag, ReplaceInFiles, ShellCommand};
use crate::registry::{Registry, RegistryBuilder};
use crate::task::{Operation, RunOptions, TaskId};
use crate::watch::WatchBinding;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "taskkit.toml";

/// Name of the task registered from the top-level `default` list.
pub const DEFAULT_TASK: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskValue {
    Simple(String),
    Complex(TaskTable),
}

/// Built-in operations selectable with `builtin = "..."`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    Bump,
    Replace,
    Commit,
    Tag,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskTable {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub pipeline: Option<Vec<String>>,
    #[serde(default)]
    pub builtin: Option<Builtin>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub replacement: Option<String>,
}

/// Watch-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            bindings: Vec::new(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

/// One `[[watch.bindings]]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub paths: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub reload: bool,
    /// Tasks that must succeed before a reload is broadcast.
    #[serde(default)]
    pub gate: Vec<String>,
}

/// Live-reload endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadConfig {
    #[serde(default = "default_reload_host")]
    pub host: String,
    #[serde(default = "default_reload_port")]
    pub port: u16,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            host: default_reload_host(),
            port: default_reload_port(),
        }
    }
}

impl ReloadConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_reload_host() -> String {
    "127.0.0.1".to_string()
}

fn default_reload_port() -> u16 {
    35729
}

fn default_version_file() -> PathBuf {
    PathBuf::from("package.json")
}

/// Project configuration as defined in `taskkit.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Tasks run by the `default` group.
    #[serde(default)]
    pub default: Vec<String>,
    /// Task that hands over to the watch loop after it completes.
    #[serde(default)]
    pub dev: Option<String>,
    /// Manifest read for `{version}` placeholders.
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,
    /// Rejects shell chaining, pipes and substitutions in task commands.
    #[serde(default)]
    pub strict_commands: bool,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskValue>,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub reload: Option<ReloadConfig>,
    /// Path the config was loaded from, for error messages and the root.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl ProjectConfig {
    /// Loads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: format!("cannot read file: {}", e),
        })?;
        let mut config = Self::parse(&content, path)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses config text; `path` is only used in error messages.
    pub fn parse(content: &str, path: impl AsRef<Path>) -> Result<Self> {
        toml::from_str(content).map_err(|error| Error::Toml {
            error,
            context: path.as_ref().display().to_string(),
        })
    }

    /// Directory containing the config file, where tasks run.
    pub fn project_root(&self) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn run_options(&self, bump: crate::release::BumpType) -> RunOptions {
        RunOptions {
            project_root: self.project_root(),
            bump,
            version_file: self.version_file.clone(),
        }
    }

    fn config_error(&self, message: impl Into<String>) -> Error {
        Error::Config {
            path: self
                .config_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE)),
            message: message.into(),
        }
    }

    /// Registers every task in declaration order and seals the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed task tables or commands the
    /// validator rejects,
    /// [`Error::DuplicateTask`] if `default` is declared twice, and
    /// [`Error::UnknownTask`] for dangling dependency references.
    pub fn to_registry(&self) -> Result<Registry> {
        let mut builder = RegistryBuilder::new();

        for (name, value) in &self.tasks {
            CommandValidator::validate_identifier(name, "Task")
                .map_err(|e| self.config_error(e.to_string()))?;
            self.register_task(&mut builder, name, value)?;
        }

        if !self.default.is_empty() {
            builder.register_group(DEFAULT_TASK, &self.default)?;
        }

        builder.build()
    }

    fn register_task(
        &self,
        builder: &mut RegistryBuilder,
        name: &str,
        value: &TaskValue,
    ) -> Result<TaskId> {
        let table = match value {
            TaskValue::Simple(command) => {
                return builder.register(name, Vec::<String>::new(), self.shell(name, command)?);
            }
            TaskValue::Complex(table) => table,
        };

        let bodies = [
            table.command.is_some(),
            table.pipeline.is_some(),
            table.builtin.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if bodies > 1 {
            return Err(self.config_error(format!(
                "task '{}' may set only one of 'command', 'pipeline' and 'builtin'",
                name
            )));
        }

        if let Some(steps) = &table.pipeline {
            if !table.depends_on.is_empty() {
                return Err(self.config_error(format!(
                    "pipeline task '{}' cannot declare depends_on; add the tasks as steps",
                    name
                )));
            }
            return builder.register_pipeline(name, steps);
        }

        let operation: Arc<dyn Operation> = if let Some(command) = &table.command {
            self.shell(name, command)?
        } else if let Some(builtin) = table.builtin {
            self.builtin_operation(name, builtin, table)?
        } else {
            return builder.register_group(name, &table.depends_on);
        };

        builder.register(name, &table.depends_on, operation)
    }

    fn command_validator(&self) -> CommandValidator {
        if self.strict_commands {
            CommandValidator::strict()
        } else {
            CommandValidator::new()
        }
    }

    fn shell(&self, name: &str, command: &str) -> Result<Arc<dyn Operation>> {
        let validator = self.command_validator();
        validator
            .validate(command)
            .map_err(|e| self.config_error(format!("task '{}': {}", name, e)))?;
        Ok(Arc::new(
            ShellCommand::new(command).with_validator(validator),
        ))
    }

    fn builtin_operation(
        &self,
        name: &str,
        builtin: Builtin,
        table: &TaskTable,
    ) -> Result<Arc<dyn Operation>> {
        let require = |field: &Option<String>, key: &str| -> Result<String> {
            field.clone().ok_or_else(|| {
                self.config_error(format!("builtin task '{}' requires '{}'", name, key))
            })
        };
        let require_files = || -> Result<()> {
            if table.files.is_empty() {
                return Err(self.config_error(format!(
                    "builtin task '{}' requires a non-empty 'files' list",
                    name
                )));
            }
            Ok(())
        };

        let operation: Arc<dyn Operation> = match builtin {
            Builtin::Bump => {
                require_files()?;
                Arc::new(BumpVersion::new(table.files.iter().cloned()))
            }
            Builtin::Replace => {
                require_files()?;
                let pattern = require(&table.pattern, "pattern")?;
                let replacement = require(&table.replacement, "replacement")?;
                let op = ReplaceInFiles::new(table.files.iter().cloned(), &pattern, replacement)
                    .map_err(|e| self.config_error(e.to_string()))?;
                Arc::new(op)
            }
            Builtin::Commit => {
                require_files()?;
                let message = require(&table.message, "message")?;
                Arc::new(GitCommit::new(table.files.iter().cloned(), message))
            }
            Builtin::Tag => {
                let tag = require(&table.name, "name")?;
                let message = table.message.clone().unwrap_or_else(|| tag.clone());
                Arc::new(GitTag::new(tag, message))
            }
        };

        Ok(operation)
    }

    /// Builds watch bindings against a registry built from this config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for bindings that neither run tasks nor
    /// reload, [`Error::UnknownTask`] for unknown task names, and
    /// [`Error::Watch`] for invalid patterns.
    pub fn watch_bindings(&self, registry: &Registry) -> Result<Vec<WatchBinding>> {
        let lookup = |names: &[String]| -> Result<Vec<TaskId>> {
            names.iter().map(|n| registry.lookup(n)).collect()
        };

        self.watch
            .bindings
            .iter()
            .enumerate()
            .map(|(idx, binding)| {
                if binding.paths.is_empty() {
                    return Err(self.config_error(format!(
                        "watch binding #{} has no paths",
                        idx + 1
                    )));
                }
                match (binding.reload, binding.tasks.is_empty()) {
                    (true, true) => Ok(WatchBinding::reload(&binding.paths)?
                        .with_gate(lookup(&binding.gate)?)),
                    (false, false) => WatchBinding::run(&binding.paths, lookup(&binding.tasks)?),
                    (true, false) => Err(self.config_error(format!(
                        "watch binding #{} sets both 'reload' and 'tasks'; use 'gate' to run tasks before a reload",
                        idx + 1
                    ))),
                    (false, true) => Err(self.config_error(format!(
                        "watch binding #{} needs 'tasks' or 'reload = true'",
                        idx + 1
                    ))),
                }
            })
            .collect()
    }
}
