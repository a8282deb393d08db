//! File watching for watch-mode re-runs.

use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::Config as NotifyConfig;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Settings for the watch loop.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Changes to one binding within this window of the first change are
    /// merged into a single trigger, queued when the window closes. Zero
    /// queues every change immediately.
    pub debounce_ms: u64,
    pub root: PathBuf,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 0,
            root: PathBuf::from("."),
        }
    }
}

/// A batch of changed paths reported by the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

/// A directory or file handed to the OS watcher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub recursive: bool,
}

/// Keeps an OS watcher alive and forwards its events into a channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Starts watching every target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Watch`] if a target does not exist or cannot be
    /// watched.
    pub fn start(targets: &[WatchTarget]) -> Result<(Self, mpsc::UnboundedReceiver<ChangeEvent>)> {
        for target in targets {
            if !target.path.exists() {
                return Err(Error::Watch(format!(
                    "Watch path does not exist: {}",
                    target.path.display()
                )));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_change(&event.kind) && !event.paths.is_empty() {
                        let _ = tx.send(ChangeEvent { paths: event.paths });
                    }
                }
                Err(e) => warn!(error = %e, "file watcher error"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::Watch(format!("Failed to create watcher: {}", e)))?;

        for target in targets {
            let mode = if target.recursive && target.path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(&target.path, mode).map_err(|e| {
                Error::Watch(format!(
                    "Failed to watch {}: {}",
                    target.path.display(),
                    e
                ))
            })?;
            debug!(path = %target.path.display(), recursive = target.recursive, "watching");
        }

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any => true,
        _ => false,
    }
}
