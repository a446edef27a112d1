//! Progress reporting abstractions
//!
//! The core library reports what it is doing through [`ProgressProvider`]
//! without knowing how (or whether) the updates are displayed.

use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Core trait for progress reporting
pub trait ProgressProvider: Send + Sync {
    /// Report a progress update
    fn report(&self, update: ProgressUpdate);

    /// Create a child provider for a nested operation
    fn create_child(&self, name: &str) -> Box<dyn ProgressProvider>;

    /// Signal that the operation is complete
    fn complete(&self);
}

/// Pipeline stage a recognition run is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    Optimizing,
    Recognizing,
    Enriching,
    FallingBack,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CacheCheck => "cache check",
            Self::Optimizing => "optimizing",
            Self::Recognizing => "recognizing",
            Self::Enriching => "enriching",
            Self::FallingBack => "falling back",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Unified progress update type
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// A state transition inside one recognition
    Stage { stage: Stage, message: String },

    /// A recognition attempt is starting (1-based)
    Attempt { attempt: u32, max_attempts: u32 },

    /// Batch operation progress
    Batch {
        current: usize,
        total: usize,
        current_item: Option<String>,
    },

    /// Generic status message
    Status { message: String },
}

impl ProgressUpdate {
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }
}

/// Discards everything
pub struct NullProvider;

impl ProgressProvider for NullProvider {
    fn report(&self, _update: ProgressUpdate) {}

    fn create_child(&self, _name: &str) -> Box<dyn ProgressProvider> {
        Box::new(NullProvider)
    }

    fn complete(&self) {}
}

/// Arc-wrapped provider for sharing across async tasks
#[derive(Clone)]
pub struct SharedProvider {
    inner: Arc<dyn ProgressProvider>,
}

impl SharedProvider {
    pub fn new(provider: Arc<dyn ProgressProvider>) -> Self {
        Self { inner: provider }
    }
}

impl ProgressProvider for SharedProvider {
    fn report(&self, update: ProgressUpdate) {
        self.inner.report(update);
    }

    fn create_child(&self, _name: &str) -> Box<dyn ProgressProvider> {
        Box::new(self.clone())
    }

    fn complete(&self) {
        self.inner.complete();
    }
}

/// Forwards updates into a tokio channel
///
/// Sends never block; an update is dropped when the receiver is gone or
/// the channel is full. [`ProgressProvider::complete`] drops the sender so
/// the receiver sees the channel close.
pub struct ChannelProvider {
    tx: Mutex<Option<mpsc::Sender<ProgressUpdate>>>,
}

impl ChannelProvider {
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Provider plus the receiving end of a channel holding `capacity` updates
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    fn sender(&self) -> Option<mpsc::Sender<ProgressUpdate>> {
        self.tx.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProgressProvider for ChannelProvider {
    fn report(&self, update: ProgressUpdate) {
        if let Some(tx) = self.sender() {
            let _ = tx.try_send(update);
        }
    }

    fn create_child(&self, _name: &str) -> Box<dyn ProgressProvider> {
        Box::new(ChannelProvider {
            tx: Mutex::new(self.sender()),
        })
    }

    fn complete(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            *guard = None;
        }
    }
}
