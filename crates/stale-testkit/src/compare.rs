use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stale_core::{Comparator, Outcome, OutcomeSink, Reading};

/// Reading carrying a monotonically increasing version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Versioned {
    /// Version number
    pub v: u64,
}

/// Shorthand for `Versioned { v }`
pub fn v(v: u64) -> Versioned {
    Versioned { v }
}

/// Greater version accepts, equal is same, smaller declines.
///
/// With nothing committed yet every reading is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionComparator;

#[async_trait]
impl Comparator<Versioned> for VersionComparator {
    async fn compare(&self, previous: Option<&Versioned>, current: &Versioned, outcome: &OutcomeSink) {
        match previous {
            Some(previous) if current.v < previous.v => outcome.decline(),
            Some(previous) if current.v == previous.v => outcome.same(),
            _ => outcome.accept(),
        };
    }
}

/// [`VersionComparator`] that sleeps before judging selected versions.
#[derive(Debug, Clone, Default)]
pub struct SlowVersionComparator {
    delay: Duration,
    slow: Vec<u64>,
}

impl SlowVersionComparator {
    /// Comparator delaying by `delay`; no version is slow yet
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slow: Vec::new(),
        }
    }

    /// Delay every comparison whose current reading has `version`
    pub fn slow_on(mut self, version: u64) -> Self {
        self.slow.push(version);
        self
    }
}

#[async_trait]
impl Comparator<Versioned> for SlowVersionComparator {
    async fn compare(&self, previous: Option<&Versioned>, current: &Versioned, outcome: &OutcomeSink) {
        if self.slow.contains(&current.v) {
            tokio::time::sleep(self.delay).await;
        }
        VersionComparator.compare(previous, current, outcome).await;
    }
}

/// Counts calls to an inner comparator.
#[derive(Debug, Clone)]
pub struct CountingComparator<C> {
    inner: C,
    calls: Arc<AtomicUsize>,
}

impl<C> CountingComparator<C> {
    /// Wrap `inner`
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Comparisons performed so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R, C> Comparator<R> for CountingComparator<C>
where
    R: Reading,
    C: Comparator<R>,
{
    async fn compare(&self, previous: Option<&R>, current: &R, outcome: &OutcomeSink) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compare(previous, current, outcome).await;
    }
}

/// Comparator that never signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentComparator;

#[async_trait]
impl<R: Reading> Comparator<R> for SilentComparator {
    async fn compare(&self, _previous: Option<&R>, _current: &R, _outcome: &OutcomeSink) {}
}

/// Comparator that signals the same outcome several times.
#[derive(Debug, Clone, Copy)]
pub struct RepeatingComparator {
    outcome: Outcome,
    times: usize,
}

impl RepeatingComparator {
    /// Signal `outcome` `times` times per comparison
    pub fn new(outcome: Outcome, times: usize) -> Self {
        Self { outcome, times }
    }
}

#[async_trait]
impl<R: Reading> Comparator<R> for RepeatingComparator {
    async fn compare(&self, _previous: Option<&R>, _current: &R, outcome: &OutcomeSink) {
        for _ in 0..self.times {
            outcome.signal(self.outcome);
        }
    }
}
