//! Sinks that receive classified errors

use super::ErrorDetails;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Receives every error the classifier produces
pub trait ErrorSink: Send + Sync {
    fn record(&self, details: &ErrorDetails);
}

/// Bounded in-memory history; the oldest entry is dropped on overflow
pub struct ErrorLog {
    capacity: usize,
    entries: Mutex<VecDeque<ErrorDetails>>,
}

impl ErrorLog {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Recorded errors, oldest first
    pub fn entries(&self) -> Vec<ErrorDetails> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ErrorSink for ErrorLog {
    fn record(&self, details: &ErrorDetails) {
        if self.capacity == 0 {
            return;
        }
        // a poisoned log only loses history
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(details.clone());
    }
}

/// Forwards classified errors to the `log` facade
pub struct LogSink;

impl ErrorSink for LogSink {
    fn record(&self, details: &ErrorDetails) {
        log::debug!(
            "Classified error {} ({}): {}",
            details.code,
            details.category,
            details.message
        );
    }
}
