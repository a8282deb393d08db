//! Live-reload broadcast to connected observers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 16;

/// A single reload notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSignal {
    /// Increases by one for every broadcast.
    pub sequence: u64,
    /// Changed paths that caused the reload.
    pub paths: Vec<PathBuf>,
}

/// Fire-and-forget broadcast channel for reload signals.
///
/// Observers only care about the latest signal, so a lagging observer simply
/// skips ahead.
#[derive(Debug)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadSignal>,
    sequence: AtomicU64,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ReloadHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.sender.subscribe()
    }

    #[inline]
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcasts a reload signal and returns how many observers received it.
    ///
    /// Having no observers is not an error.
    pub fn notify(&self, paths: Vec<PathBuf>) -> usize {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        match self.sender.send(ReloadSignal { sequence, paths }) {
            Ok(observers) => {
                debug!(sequence, observers, "reload signal sent");
                observers
            }
            Err(_) => {
                debug!(sequence, "no reload observers connected");
                0
            }
        }
    }
}
