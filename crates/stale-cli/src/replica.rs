//! Simulated replica set with lagging members.
//!
//! Every request picks a replica at random. Fresh replicas report the head
//! version, lagging ones report `head - lag`, and any request may fail with
//! the configured probability. The RNG is seeded so runs are reproducible.

use std::sync::Arc;

use anyhow::{ensure, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use stale_core::{Comparator, OutcomeSink, ReadingSource, RequestError};

/// Version observed from one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub version: u64,
    pub replica: usize,
}

/// Shape of the simulated replica set.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaLayout {
    pub replicas: usize,
    pub lagging: usize,
    pub lag: u64,
    pub failure_rate: f64,
}

struct ReplicaState {
    head: u64,
    /// Per-replica lag behind `head`
    lags: Vec<u64>,
    failure_rate: f64,
    rng: ChaCha8Rng,
}

/// Cloneable handle to a simulated replica set.
#[derive(Clone)]
pub struct ReplicaSet {
    state: Arc<Mutex<ReplicaState>>,
}

impl ReplicaSet {
    pub fn new(layout: ReplicaLayout, seed: u64) -> Result<Self> {
        ensure!(layout.replicas > 0, "at least one replica is required");
        ensure!(
            layout.lagging <= layout.replicas,
            "cannot have {} lagging replicas out of {}",
            layout.lagging,
            layout.replicas
        );
        ensure!(
            (0.0..=1.0).contains(&layout.failure_rate),
            "failure rate must be within 0.0..=1.0"
        );

        // Lagging replicas are the last `lagging` indices.
        let lags = (0..layout.replicas)
            .map(|i| {
                if i >= layout.replicas - layout.lagging {
                    layout.lag
                } else {
                    0
                }
            })
            .collect();

        Ok(Self {
            state: Arc::new(Mutex::new(ReplicaState {
                head: 1,
                lags,
                failure_rate: layout.failure_rate,
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        })
    }

    /// Write a new version; returns the new head.
    pub fn advance(&self) -> u64 {
        let mut state = self.state.lock();
        state.head += 1;
        state.head
    }

    pub fn head(&self) -> u64 {
        self.state.lock().head
    }
}

#[async_trait]
impl ReadingSource<Snapshot> for ReplicaSet {
    async fn request(&self) -> Result<Snapshot, RequestError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let replica = state.rng.gen_range(0..state.lags.len());
        if state.rng.gen_bool(state.failure_rate) {
            return Err(RequestError::new(format!("replica {replica} unavailable")));
        }

        Ok(Snapshot {
            version: state.head.saturating_sub(state.lags[replica]),
            replica,
        })
    }
}

/// Orders snapshots by version.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotComparator;

#[async_trait]
impl Comparator<Snapshot> for SnapshotComparator {
    async fn compare(&self, previous: Option<&Snapshot>, current: &Snapshot, outcome: &OutcomeSink) {
        match previous {
            None => outcome.accept(),
            Some(prev) if current.version > prev.version => outcome.accept(),
            Some(prev) if current.version == prev.version => outcome.same(),
            Some(_) => outcome.decline(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stale_core::Outcome;

    fn layout(replicas: usize, lagging: usize) -> ReplicaLayout {
        ReplicaLayout {
            replicas,
            lagging,
            lag: 2,
            failure_rate: 0.0,
        }
    }

    #[tokio::test]
    async fn same_seed_same_answers() {
        let a = ReplicaSet::new(layout(5, 2), 7).unwrap();
        let b = ReplicaSet::new(layout(5, 2), 7).unwrap();
        for _ in 0..20 {
            assert_eq!(a.request().await.unwrap(), b.request().await.unwrap());
        }
    }

    #[tokio::test]
    async fn lagging_replicas_report_older_versions() {
        let set = ReplicaSet::new(layout(3, 3), 1).unwrap();
        set.advance();
        set.advance();
        assert_eq!(set.head(), 3);
        assert_eq!(set.request().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn lag_never_underflows() {
        let set = ReplicaSet::new(layout(2, 2), 1).unwrap();
        assert_eq!(set.request().await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn certain_failure_always_errors() {
        let mut shape = layout(3, 0);
        shape.failure_rate = 1.0;
        let set = ReplicaSet::new(shape, 3).unwrap();
        assert!(set.request().await.is_err());
    }

    #[test]
    fn rejects_impossible_layouts() {
        assert!(ReplicaSet::new(layout(0, 0), 1).is_err());
        assert!(ReplicaSet::new(layout(2, 3), 1).is_err());
        let mut shape = layout(2, 0);
        shape.failure_rate = 1.5;
        assert!(ReplicaSet::new(shape, 1).is_err());
    }

    #[tokio::test]
    async fn comparator_orders_by_version() {
        let at = |version| Snapshot { version, replica: 0 };
        let judge = |previous: Option<Snapshot>, current: Snapshot| async move {
            let sink = OutcomeSink::new();
            SnapshotComparator
                .compare(previous.as_ref(), &current, &sink)
                .await;
            sink.outcome()
        };

        assert_eq!(judge(None, at(1)).await, Some(Outcome::Accept));
        assert_eq!(judge(Some(at(1)), at(2)).await, Some(Outcome::Accept));
        assert_eq!(judge(Some(at(2)), at(2)).await, Some(Outcome::Same));
        assert_eq!(judge(Some(at(3)), at(2)).await, Some(Outcome::Decline));
    }
}
