use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stale_core::{CommitSink, ErrorHandler, Reading, StaleError};

/// Commit sink that records every committed reading.
#[derive(Debug, Clone)]
pub struct RecordingSink<R> {
    commits: Arc<Mutex<Vec<R>>>,
}

impl<R: Reading> RecordingSink<R> {
    /// Empty recorder
    pub fn new() -> Self {
        Self {
            commits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Readings committed so far, oldest first
    pub fn commits(&self) -> Vec<R> {
        self.commits.lock().clone()
    }

    /// Number of commits
    pub fn count(&self) -> usize {
        self.commits.lock().len()
    }

    /// Most recent commit
    pub fn last(&self) -> Option<R> {
        self.commits.lock().last().cloned()
    }
}

impl<R: Reading> Default for RecordingSink<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Reading> CommitSink<R> for RecordingSink<R> {
    async fn commit(&self, reading: &R) {
        self.commits.lock().push(reading.clone());
    }
}

/// Error handler that records every reported error.
#[derive(Debug, Clone, Default)]
pub struct RecordingErrors {
    errors: Arc<Mutex<Vec<StaleError>>>,
}

impl RecordingErrors {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors reported so far
    pub fn errors(&self) -> Vec<StaleError> {
        self.errors.lock().clone()
    }

    /// Number of reported errors
    pub fn count(&self) -> usize {
        self.errors.lock().len()
    }
}

impl ErrorHandler for RecordingErrors {
    fn handle(&self, error: &StaleError) {
        self.errors.lock().push(error.clone());
    }
}
