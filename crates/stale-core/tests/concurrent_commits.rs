//! Commits racing on one policy, and commit sinks that call back into it.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stale_core::{CommitSink, CycleOutcome, StaleConfig, StalePolicy};
use stale_testkit::{
    v, RecordingSink, ScriptedSource, SlowVersionComparator, VersionComparator, Versioned,
};

/// Policy at v5 whose comparator takes 20ms whenever it judges `slow`.
fn racing_policy(slow: u64) -> (Arc<StalePolicy<Versioned>>, RecordingSink<Versioned>) {
    let sink = RecordingSink::new();
    let policy = StalePolicy::with_capabilities(
        StaleConfig::default(),
        ScriptedSource::<Versioned>::new(),
        SlowVersionComparator::new(Duration::from_millis(20)).slow_on(slow),
        sink.clone(),
    )
    .unwrap()
    .with_previous(v(5));
    (Arc::new(policy), sink)
}

#[tokio::test(start_paused = true)]
async fn newer_reading_still_commits_after_losing_the_race() {
    let (policy, sink) = racing_policy(7);

    // v7 is compared first but judged slowly; v6 commits in the meantime.
    let (newer, older) = tokio::join!(policy.compare(v(7)), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        policy.compare(v(6)).await
    });

    assert_eq!(older.unwrap(), CycleOutcome::Accepted);
    assert_eq!(newer.unwrap(), CycleOutcome::Accepted);
    assert_eq!(sink.commits(), vec![v(6), v(7)]);
    assert_eq!(policy.previous().await, Some(v(7)));
    assert_eq!(policy.generation().await, 2);
}

#[tokio::test(start_paused = true)]
async fn older_reading_is_dropped_after_newer_commit() {
    let (policy, sink) = racing_policy(6);

    let (older, newer) = tokio::join!(policy.compare(v(6)), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        policy.compare(v(7)).await
    });

    assert_eq!(newer.unwrap(), CycleOutcome::Accepted);
    assert_eq!(older.unwrap(), CycleOutcome::Superseded);
    assert_eq!(sink.commits(), vec![v(7)]);
    assert_eq!(policy.previous().await, Some(v(7)));
}

/// Sink that answers the first commit by pushing v2 through the same policy.
#[derive(Clone)]
struct ChainingSink {
    policy: Weak<StalePolicy<Versioned>>,
    recorded: RecordingSink<Versioned>,
    nested: Arc<Mutex<Vec<CycleOutcome>>>,
}

#[async_trait]
impl CommitSink<Versioned> for ChainingSink {
    async fn commit(&self, reading: &Versioned) {
        self.recorded.commit(reading).await;
        if *reading != v(1) {
            return;
        }
        let Some(policy) = self.policy.upgrade() else {
            return;
        };
        let outcome = policy.compare(v(2)).await.unwrap();
        self.nested.lock().push(outcome);
    }
}

#[tokio::test]
async fn commit_sink_can_call_back_into_the_policy() {
    let policy = Arc::new(StalePolicy::<Versioned>::new(StaleConfig::default()).unwrap());
    let source = ScriptedSource::new();
    source.push_ok(v(1));
    let sink = ChainingSink {
        policy: Arc::downgrade(&policy),
        recorded: RecordingSink::new(),
        nested: Arc::new(Mutex::new(Vec::new())),
    };
    policy
        .set_request(source)
        .set_compare(VersionComparator)
        .set_commit(sink.clone());

    let outcome = tokio::time::timeout(Duration::from_secs(2), policy.fetch())
        .await
        .expect("fetch deadlocked on a re-entrant commit")
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Accepted);
    assert_eq!(*sink.nested.lock(), vec![CycleOutcome::Accepted]);
    assert_eq!(sink.recorded.commits(), vec![v(1), v(2)]);
    assert_eq!(policy.previous().await, Some(v(2)));
}
