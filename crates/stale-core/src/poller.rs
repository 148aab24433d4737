//! Interval poller for a stale-state policy.
//!
//! Calls [`StalePolicy::fetch`] once on start and then every period. A manual
//! [`IntervalPoller::trigger`] fetches right away and restarts the period, so a
//! fetch is never followed by another one sooner than `period` unless asked
//! for. Fetches the application runs directly on the policy restart the
//! period as well. Cycles never overlap: the next tick is only armed once the
//! previous fetch has finished. Shutdown takes precedence over a pending
//! tick or trigger.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for JoinHandle storage because:
//! 1. Operations are O(1) take or replace
//! 2. Lock is never held across `.await` points

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::effects::Reading;
use crate::errors::{Result, StaleError};
use crate::policy::StalePolicy;

/// Background task driving periodic fetches.
#[derive(Debug)]
pub struct IntervalPoller {
    period: Duration,
    shutdown_tx: watch::Sender<bool>,
    trigger: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IntervalPoller {
    /// Start polling with the policy's configured `interval_ms`.
    pub fn start<R: Reading>(policy: Arc<StalePolicy<R>>) -> Result<Self> {
        let period = policy.config().interval().ok_or_else(|| {
            StaleError::configuration("interval_ms must be positive to start a poller")
        })?;
        Self::start_with_period(policy, period)
    }

    /// Start polling with an explicit period.
    pub fn start_with_period<R: Reading>(
        policy: Arc<StalePolicy<R>>,
        period: Duration,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(StaleError::configuration("poll period must be positive"));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());
        let handle = tokio::spawn(run(policy, period, Arc::clone(&trigger), shutdown_rx));

        Ok(Self {
            period,
            shutdown_tx,
            trigger,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Poll period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Fetch now and restart the period.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Whether the polling task is still alive
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop polling, waiting for an in-flight fetch to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "poller task ended abnormally");
            }
        }
    }
}

impl Drop for IntervalPoller {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

async fn run<R: Reading>(
    policy: Arc<StalePolicy<R>>,
    period: Duration,
    trigger: Arc<Notify>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut fetches = policy.fetch_signal();

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            Ok(()) = fetches.changed() => {
                tracing::trace!(policy = %policy.config().label(), "fetched elsewhere, restarting period");
                ticker.reset();
                continue;
            }
            _ = ticker.tick() => {}
            _ = trigger.notified() => {
                tracing::debug!(policy = %policy.config().label(), "manual fetch requested");
            }
        }

        match policy.fetch().await {
            Ok(outcome) => {
                tracing::debug!(policy = %policy.config().label(), ?outcome, "poll cycle finished");
            }
            Err(error) => {
                tracing::warn!(
                    policy = %policy.config().label(),
                    %error,
                    "stopping poller, policy is misconfigured"
                );
                break;
            }
        }

        fetches.mark_unchanged();
        ticker.reset();
    }
}
