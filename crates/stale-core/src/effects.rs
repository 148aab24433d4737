//! Capability Effects
//!
//! The policy never talks to a transport or a consumer directly. It is wired
//! to four capabilities:
//!
//! - [`ReadingSource`]: obtains a fresh reading (HTTP call, DB read, RPC)
//! - [`Comparator`]: decides whether a reading is newer, older or the same
//! - [`CommitSink`]: receives readings the policy has accepted
//! - [`ErrorHandler`]: observes contained failures (optional)
//!
//! Closure adapters ([`source_fn`], [`compare_fn`], [`commit_fn`],
//! [`error_fn`]) cover the common case where a full trait impl is overkill.

use std::future::Future;

use async_trait::async_trait;

use crate::errors::{RequestError, StaleError};
use crate::outcome::OutcomeSink;

/// Opaque snapshot of the monitored data.
///
/// The policy clones the committed reading out of its lock before every
/// comparison, so readings should be cheap to clone (wrap large payloads in
/// `Arc`).
pub trait Reading: Clone + Send + Sync + 'static {}

impl<T> Reading for T where T: Clone + Send + Sync + 'static {}

/// Source of fresh readings.
#[async_trait]
pub trait ReadingSource<R: Reading>: Send + Sync {
    /// Fetch one reading. Must resolve exactly once per call.
    async fn request(&self) -> Result<R, RequestError>;
}

/// Reading comparison.
///
/// Implementations signal exactly one outcome on `outcome` before returning.
/// `previous` is `None` until something has been committed.
#[async_trait]
pub trait Comparator<R: Reading>: Send + Sync {
    /// Compare `current` against `previous`.
    async fn compare(&self, previous: Option<&R>, current: &R, outcome: &OutcomeSink);
}

/// Consumer of accepted readings.
#[async_trait]
pub trait CommitSink<R: Reading>: Send + Sync {
    /// Receive a reading the policy now trusts.
    async fn commit(&self, reading: &R);
}

/// Observer for failures contained inside a fetch cycle.
pub trait ErrorHandler: Send + Sync {
    /// Handle a contained failure.
    fn handle(&self, error: &StaleError);
}

/// Default error handler: swallows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentErrors;

impl ErrorHandler for SilentErrors {
    fn handle(&self, _error: &StaleError) {}
}

/// [`ReadingSource`] backed by an async closure.
#[derive(Debug, Clone)]
pub struct SourceFn<F>(F);

/// Wrap an async closure as a [`ReadingSource`].
pub fn source_fn<R, F, Fut>(f: F) -> SourceFn<F>
where
    R: Reading,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, RequestError>> + Send + 'static,
{
    SourceFn(f)
}

#[async_trait]
impl<R, F, Fut> ReadingSource<R> for SourceFn<F>
where
    R: Reading,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, RequestError>> + Send + 'static,
{
    async fn request(&self) -> Result<R, RequestError> {
        (self.0)().await
    }
}

/// [`Comparator`] backed by a synchronous closure.
#[derive(Debug, Clone)]
pub struct CompareFn<F>(F);

/// Wrap a closure as a [`Comparator`].
pub fn compare_fn<R, F>(f: F) -> CompareFn<F>
where
    R: Reading,
    F: Fn(Option<&R>, &R, &OutcomeSink) + Send + Sync,
{
    CompareFn(f)
}

#[async_trait]
impl<R, F> Comparator<R> for CompareFn<F>
where
    R: Reading,
    F: Fn(Option<&R>, &R, &OutcomeSink) + Send + Sync,
{
    async fn compare(&self, previous: Option<&R>, current: &R, outcome: &OutcomeSink) {
        (self.0)(previous, current, outcome);
    }
}

/// [`CommitSink`] backed by a synchronous closure.
#[derive(Debug, Clone)]
pub struct CommitFn<F>(F);

/// Wrap a closure as a [`CommitSink`].
pub fn commit_fn<R, F>(f: F) -> CommitFn<F>
where
    R: Reading,
    F: Fn(&R) + Send + Sync,
{
    CommitFn(f)
}

#[async_trait]
impl<R, F> CommitSink<R> for CommitFn<F>
where
    R: Reading,
    F: Fn(&R) + Send + Sync,
{
    async fn commit(&self, reading: &R) {
        (self.0)(reading);
    }
}

/// [`ErrorHandler`] backed by a closure.
#[derive(Debug, Clone)]
pub struct ErrorFn<F>(F);

/// Wrap a closure as an [`ErrorHandler`].
pub fn error_fn<F>(f: F) -> ErrorFn<F>
where
    F: Fn(&StaleError) + Send + Sync,
{
    ErrorFn(f)
}

impl<F> ErrorHandler for ErrorFn<F>
where
    F: Fn(&StaleError) + Send + Sync,
{
    fn handle(&self, error: &StaleError) {
        (self.0)(error);
    }
}
