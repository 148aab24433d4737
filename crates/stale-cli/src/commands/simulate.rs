//! Poll a simulated replica set through the stale-state policy.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{ensure, Result};
use clap::Args;
use parking_lot::Mutex;
use serde::Serialize;
use stale_core::{commit_fn, error_fn, CycleOutcome, StaleConfig, StalePolicy, Verdict};

use crate::replica::{ReplicaLayout, ReplicaSet, Snapshot, SnapshotComparator};

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of replicas
    #[arg(long, default_value = "5")]
    pub replicas: usize,

    /// How many of them lag behind the head
    #[arg(long, default_value = "2")]
    pub lagging: usize,

    /// Versions a lagging replica trails by
    #[arg(long, default_value = "1")]
    pub lag: u64,

    /// Fetch cycles to run
    #[arg(long, default_value = "20")]
    pub rounds: u32,

    /// Advance the head every N rounds
    #[arg(long, default_value = "3")]
    pub advance_every: u32,

    /// Probability that a single request fails
    #[arg(long, default_value = "0.0")]
    pub failure_rate: f64,

    /// RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Override the configured probe count
    #[arg(long)]
    pub probes: Option<u32>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Summary of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub rounds: u32,
    pub head: u64,
    pub committed: Option<u64>,
    /// Versions in commit order
    pub commits: Vec<u64>,
    /// Cycle outcome counts keyed by label
    pub outcomes: BTreeMap<&'static str, u32>,
    pub reported_errors: u32,
}

pub async fn handle_simulate_command(args: SimulateArgs, config: StaleConfig) -> Result<()> {
    let json = args.json;
    let report = run(args, config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("rounds:    {}", report.rounds);
        println!("head:      {}", report.head);
        match report.committed {
            Some(version) => println!("committed: {version}"),
            None => println!("committed: none"),
        }
        println!("commits:   {:?}", report.commits);
        println!("errors:    {}", report.reported_errors);
        for (label, count) in &report.outcomes {
            println!("  {label:<22} {count}");
        }
    }
    Ok(())
}

pub async fn run(args: SimulateArgs, mut config: StaleConfig) -> Result<SimulationReport> {
    ensure!(args.advance_every > 0, "--advance-every must be positive");
    if let Some(probes) = args.probes {
        config = config.with_probe_count(probes);
    }
    if config.name.is_none() {
        config.name = Some("simulate".to_string());
    }

    let replicas = ReplicaSet::new(
        ReplicaLayout {
            replicas: args.replicas,
            lagging: args.lagging,
            lag: args.lag,
            failure_rate: args.failure_rate,
        },
        args.seed,
    )?;

    let commits = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(0u32));

    let policy = StalePolicy::with_capabilities(config, replicas.clone(), SnapshotComparator, {
        let commits = Arc::clone(&commits);
        commit_fn(move |snapshot: &Snapshot| {
            tracing::info!(
                version = snapshot.version,
                replica = snapshot.replica,
                "committed snapshot"
            );
            commits.lock().push(snapshot.version);
        })
    })?;
    policy.set_error({
        let errors = Arc::clone(&errors);
        error_fn(move |error| {
            tracing::warn!(%error, "policy reported a failure");
            *errors.lock() += 1;
        })
    });

    let mut outcomes = BTreeMap::new();
    for round in 0..args.rounds {
        if round > 0 && round % args.advance_every == 0 {
            let head = replicas.advance();
            tracing::debug!(round, head, "head advanced");
        }
        let outcome = policy.fetch().await?;
        tracing::debug!(round, ?outcome, "round finished");
        *outcomes.entry(label(&outcome)).or_insert(0) += 1;
    }

    let committed = policy.previous().await.map(|snapshot| snapshot.version);
    let commits = commits.lock().clone();
    let reported_errors = *errors.lock();

    Ok(SimulationReport {
        rounds: args.rounds,
        head: replicas.head(),
        committed,
        commits,
        outcomes,
        reported_errors,
    })
}

fn label(outcome: &CycleOutcome) -> &'static str {
    match outcome {
        CycleOutcome::Accepted => "accepted",
        CycleOutcome::Unchanged => "unchanged",
        CycleOutcome::Verified { verdict, .. } => match verdict {
            Verdict::KeepPrevious => "verified-keep",
            Verdict::AdoptDeclined => "verified-adopt",
            Verdict::Refetch => "verified-refetch",
            Verdict::Inconclusive => "inconclusive",
        },
        CycleOutcome::RefetchLimitReached { .. } => "refetch-limit",
        CycleOutcome::Superseded => "superseded",
        CycleOutcome::RequestFailed(_) => "request-failed",
        CycleOutcome::ComparatorSilent => "comparator-silent",
    }
}
