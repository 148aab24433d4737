//! Verification loop tests: probe count, ordering and tally folding.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use stale_core::{
    Capability, CycleOutcome, Outcome, StaleConfig, StaleError, StalePolicy, Tally,
};
use stale_testkit::{
    v, RecordingSink, RepeatingComparator, ScriptedSource, SilentComparator, VersionComparator,
    Versioned,
};

fn policy_with(
    probe_count: u32,
    source: ScriptedSource<Versioned>,
) -> StalePolicy<Versioned> {
    StalePolicy::with_capabilities(
        StaleConfig::default().with_probe_count(probe_count),
        source,
        VersionComparator,
        RecordingSink::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn verify_issues_exactly_probe_count_requests() {
    for probe_count in [1, 2, 6, 11] {
        let source = ScriptedSource::new();
        source.repeat(v(1));
        let policy = policy_with(probe_count, source.clone());

        let tally = policy.verify(Some(&v(0))).await.unwrap();

        assert_eq!(source.calls(), probe_count as usize);
        assert_eq!(tally.total(), probe_count);
    }
}

#[tokio::test]
async fn all_newer_probes_tally_as_accept() {
    let source = ScriptedSource::new();
    source.repeat(v(1));
    let policy = policy_with(6, source);

    let tally = policy.verify(Some(&v(0))).await.unwrap();

    assert_eq!(
        tally,
        Tally {
            accept: 6,
            decline: 0,
            same: 0
        }
    );
    assert!(policy.majority(tally.accept));
}

#[tokio::test]
async fn request_failures_fold_into_decline() {
    let source = ScriptedSource::new();
    source
        .push_err("timeout")
        .push_ok(v(1))
        .push_err("reset")
        .push_ok(v(0))
        .push_ok(v(1))
        .push_err("timeout");
    let policy = policy_with(6, source);

    let tally = policy.verify(Some(&v(0))).await.unwrap();

    assert_eq!(
        tally,
        Tally {
            accept: 2,
            decline: 3,
            same: 1
        }
    );
}

#[tokio::test]
async fn silent_probe_counts_as_decline() {
    let source = ScriptedSource::new();
    source.repeat(v(1));
    let policy = StalePolicy::with_capabilities(
        StaleConfig::default(),
        source,
        SilentComparator,
        RecordingSink::<Versioned>::new(),
    )
    .unwrap();

    let tally = policy.verify(None).await.unwrap();

    assert_eq!(tally.decline, 6);
    assert_eq!(tally.total(), 6);
}

#[tokio::test]
async fn repeated_signals_count_once_per_probe() {
    let source = ScriptedSource::new();
    source.repeat(v(1));
    let policy = StalePolicy::with_capabilities(
        StaleConfig::default(),
        source,
        RepeatingComparator::new(Outcome::Decline, 3),
        RecordingSink::<Versioned>::new(),
    )
    .unwrap();

    let tally = policy.verify(Some(&v(1))).await.unwrap();

    assert_eq!(
        tally,
        Tally {
            accept: 0,
            decline: 6,
            same: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn probes_never_overlap() {
    let source = ScriptedSource::new().with_delay(Duration::from_millis(25));
    source.repeat(v(2));
    let policy = policy_with(6, source.clone());

    let started = tokio::time::Instant::now();
    policy.verify(Some(&v(1))).await.unwrap();

    assert_eq!(source.max_in_flight(), 1);
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn verify_compares_against_given_baseline_not_committed_state() {
    let source = ScriptedSource::new();
    source.repeat(v(5));
    let policy = policy_with(4, source).with_previous(v(9));

    // Against the committed v9 these would all decline.
    let tally = policy.verify(Some(&v(5))).await.unwrap();

    assert_eq!(tally.same, 4);
}

#[tokio::test]
async fn verify_requires_request_and_compare() {
    let policy = StalePolicy::<Versioned>::new(StaleConfig::default()).unwrap();
    assert_eq!(
        policy.verify(None).await,
        Err(StaleError::missing(Capability::Request))
    );

    policy.set_request(ScriptedSource::<Versioned>::new());
    assert_eq!(
        policy.verify(None).await,
        Err(StaleError::missing(Capability::Compare))
    );
}

#[tokio::test(start_paused = true)]
async fn commit_decided_against_replaced_baseline_is_dropped() {
    let source = ScriptedSource::new().with_delay(Duration::from_millis(10));
    source.repeat(v(3));
    let sink = RecordingSink::new();
    let policy = Arc::new(
        StalePolicy::with_capabilities(
            StaleConfig::default(),
            source,
            VersionComparator,
            sink.clone(),
        )
        .unwrap()
        .with_previous(v(5)),
    );

    // v3 declines against v5 and starts a slow verification; v7 is accepted
    // while it runs.
    let (slow, fast) = tokio::join!(policy.compare(v(3)), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        policy.compare(v(7)).await
    });

    assert_eq!(fast.unwrap(), CycleOutcome::Accepted);
    assert_eq!(slow.unwrap(), CycleOutcome::Superseded);
    assert_eq!(sink.commits(), vec![v(7)]);
    assert_eq!(policy.previous().await, Some(v(7)));
}
