//! Watch mode: re-run tasks and broadcast reloads on file changes.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::reload::ReloadHub;
use crate::task::TaskId;
use crate::watcher::{ChangeEvent, FileWatcher, WatchTarget, WatcherConfig};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// What a binding does when one of its paths changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Run each task in order, one `Executor::run` per task.
    Run(Vec<TaskId>),
    /// Broadcast a reload, after the gate tasks succeed (if any).
    Reload { gate: Vec<TaskId> },
}

/// Pairs path patterns with a reaction.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    label: String,
    patterns: Vec<Pattern>,
    reaction: Reaction,
}

impl WatchBinding {
    /// Creates a binding from glob patterns relative to the project root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Watch`] if a pattern is not a valid glob.
    pub fn new<I, S>(patterns: I, reaction: Reaction) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|e| {
                    Error::Watch(format!("Invalid watch pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if patterns.is_empty() {
            return Err(Error::Watch("Watch binding has no paths".to_string()));
        }

        let label = patterns
            .iter()
            .map(Pattern::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Self {
            label,
            patterns,
            reaction,
        })
    }

    /// Binding that re-runs `tasks` on change.
    pub fn run<I, S>(patterns: I, tasks: Vec<TaskId>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(patterns, Reaction::Run(tasks))
    }

    /// Binding that broadcasts a reload on change.
    pub fn reload<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(patterns, Reaction::Reload { gate: Vec::new() })
    }

    /// Requires `gate` tasks to succeed before a reload is broadcast.
    ///
    /// Has no effect on bindings that re-run tasks.
    pub fn with_gate(mut self, gate: Vec<TaskId>) -> Self {
        if let Reaction::Reload { gate: current } = &mut self.reaction {
            *current = gate;
        }
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn reaction(&self) -> &Reaction {
        &self.reaction
    }

    /// Whether a path relative to the project root matches this binding.
    pub fn matches(&self, path: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(path, MATCH_OPTIONS))
    }

    /// Directories and files that must be watched to observe this binding.
    pub fn targets(&self) -> Vec<WatchTarget> {
        self.patterns
            .iter()
            .map(|p| pattern_target(p.as_str()))
            .collect()
    }
}

/// The longest literal prefix of a glob, and whether anything below it
/// deeper than one level can match.
fn pattern_target(pattern: &str) -> WatchTarget {
    let mut root = PathBuf::new();
    let mut rest = Vec::new();
    let mut literal = true;

    for component in Path::new(pattern).components() {
        let Component::Normal(part) = component else {
            if literal {
                root.push(component.as_os_str());
            }
            continue;
        };
        let part = part.to_string_lossy();
        if literal && !part.contains(['*', '?', '[']) {
            root.push(&*part);
        } else {
            literal = false;
            rest.push(part.into_owned());
        }
    }

    let recursive = rest.len() > 1 || rest.iter().any(|r| r.contains("**"));
    WatchTarget {
        path: root,
        recursive: recursive || rest.is_empty(),
    }
}

struct Trigger {
    paths: Vec<PathBuf>,
}

/// Changes merged while a binding's debounce window is open.
struct PendingTrigger {
    deadline: Instant,
    paths: Vec<PathBuf>,
}

struct BindingQueue {
    binding: WatchBinding,
    sender: mpsc::UnboundedSender<Trigger>,
    pending: Option<PendingTrigger>,
}

impl BindingQueue {
    fn enqueue(&self, paths: Vec<PathBuf>) {
        if self.sender.send(Trigger { paths }).is_err() {
            warn!(binding = self.binding.label(), "watch worker is gone, dropping change");
        }
    }

    fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            trace!(binding = self.binding.label(), changed = pending.paths.len(), "debounce window closed");
            self.enqueue(pending.paths);
        }
    }
}

/// Observes changes and dispatches them to bindings.
///
/// Each binding owns a FIFO queue drained by its own worker, so runs for one
/// binding never overlap while different bindings proceed independently.
/// Failures inside triggered runs are reported and never stop the loop.
pub struct WatchLoop {
    executor: Arc<Executor>,
    reload: Arc<ReloadHub>,
    config: WatcherConfig,
}

impl WatchLoop {
    pub fn new(executor: Arc<Executor>, reload: Arc<ReloadHub>) -> Self {
        Self {
            executor,
            reload,
            config: WatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.debounce_ms)
    }

    /// Paths the OS watcher needs for `bindings`, resolved against the root.
    pub fn targets(&self, bindings: &[WatchBinding]) -> Vec<WatchTarget> {
        let targets: BTreeSet<WatchTarget> = bindings
            .iter()
            .flat_map(WatchBinding::targets)
            .map(|t| WatchTarget {
                path: self.config.root.join(&t.path),
                recursive: t.recursive,
            })
            .collect();
        targets.into_iter().collect()
    }

    /// Watches the filesystem until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Watch`] if a watched path does not exist or the OS
    /// watcher cannot be set up. Task failures are never returned.
    pub async fn watch(&self, bindings: Vec<WatchBinding>, cancel: CancellationToken) -> Result<()> {
        let targets = self.targets(&bindings);
        let (watcher, events) = FileWatcher::start(&targets)?;
        info!(
            bindings = bindings.len(),
            targets = targets.len(),
            "watching for changes"
        );

        let result = self.run_events(bindings, events, cancel).await;
        drop(watcher);
        result
    }

    /// Dispatches events from any source until the source closes or `cancel`
    /// fires.
    ///
    /// With a non-zero debounce, the first matching change opens a window for
    /// its binding; later changes inside the window are merged into the same
    /// trigger, which is queued when the window closes.
    ///
    /// When the source closes, pending and queued runs still execute before
    /// this returns. On cancellation they are discarded and in-flight runs are
    /// allowed to finish.
    pub async fn run_events(
        &self,
        bindings: Vec<WatchBinding>,
        mut events: mpsc::UnboundedReceiver<ChangeEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let root = self
            .config
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.config.root.clone());
        let debounce = self.debounce();

        let mut queues = Vec::with_capacity(bindings.len());
        let mut workers = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let (sender, receiver) = mpsc::unbounded_channel();
            let worker = BindingWorker {
                label: binding.label().to_string(),
                reaction: binding.reaction().clone(),
                executor: Arc::clone(&self.executor),
                reload: Arc::clone(&self.reload),
            };
            workers.push(tokio::spawn(worker.run(receiver, cancel.clone())));
            queues.push(BindingQueue {
                binding,
                sender,
                pending: None,
            });
        }

        loop {
            let next_flush = queues
                .iter()
                .filter_map(|q| q.pending.as_ref().map(|p| p.deadline))
                .min();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("watch loop cancelled");
                    break;
                }
                _ = time::sleep_until(next_flush.unwrap_or_else(Instant::now)), if next_flush.is_some() => {
                    let now = Instant::now();
                    for queue in queues.iter_mut() {
                        if queue.pending.as_ref().is_some_and(|p| p.deadline <= now) {
                            queue.flush();
                        }
                    }
                }
                event = events.recv() => match event {
                    Some(event) => dispatch(&mut queues, &root, debounce, event),
                    None => {
                        debug!("change source closed");
                        queues.iter_mut().for_each(BindingQueue::flush);
                        break;
                    }
                },
            }
        }

        drop(queues);
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "watch worker panicked");
            }
        }

        Ok(())
    }
}

fn dispatch(queues: &mut [BindingQueue], root: &Path, debounce: Duration, event: ChangeEvent) {
    let relative: Vec<PathBuf> = event
        .paths
        .iter()
        .map(|p| p.strip_prefix(root).unwrap_or(p).to_path_buf())
        .collect();

    for queue in queues.iter_mut() {
        let matched: Vec<PathBuf> = relative
            .iter()
            .filter(|p| queue.binding.matches(p))
            .cloned()
            .collect();
        if matched.is_empty() {
            continue;
        }

        if debounce.is_zero() {
            queue.enqueue(matched);
            continue;
        }

        match &mut queue.pending {
            Some(pending) => {
                trace!(binding = queue.binding.label(), "merging change into pending trigger");
                for path in matched {
                    if !pending.paths.contains(&path) {
                        pending.paths.push(path);
                    }
                }
            }
            None => {
                queue.pending = Some(PendingTrigger {
                    deadline: Instant::now() + debounce,
                    paths: matched,
                });
            }
        }
    }
}

struct BindingWorker {
    label: String,
    reaction: Reaction,
    executor: Arc<Executor>,
    reload: Arc<ReloadHub>,
}

impl BindingWorker {
    async fn run(self, mut triggers: mpsc::UnboundedReceiver<Trigger>, cancel: CancellationToken) {
        while let Some(trigger) = triggers.recv().await {
            if cancel.is_cancelled() {
                debug!(binding = %self.label, "discarding queued changes after cancel");
                break;
            }
            self.handle(trigger).await;
        }
    }

    async fn handle(&self, trigger: Trigger) {
        let reporter = self.executor.reporter();
        reporter.watch_triggered(&self.label, &trigger.paths);

        match &self.reaction {
            Reaction::Run(tasks) => {
                for task in tasks {
                    if let Err(error) = self.executor.run(*task).await {
                        debug!(binding = %self.label, task = self.executor.registry().name(*task), "triggered run failed");
                        reporter.watch_run_failed(&self.label, &error);
                    }
                }
            }
            Reaction::Reload { gate } => {
                for task in gate {
                    if let Err(error) = self.executor.run(*task).await {
                        debug!(binding = %self.label, "gate failed, reload skipped");
                        reporter.watch_run_failed(&self.label, &error);
                        return;
                    }
                }
                let observers = self.reload.notify(trigger.paths);
                reporter.reload_sent(observers);
            }
        }
    }
}
