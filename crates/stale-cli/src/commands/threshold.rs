//! Majority threshold table.

use anyhow::{Context, Result};
use clap::Args;
use stale_core::{ProbeCount, StaleConfig};

#[derive(Debug, Args)]
pub struct ThresholdArgs {
    /// Probe count to inspect; defaults to the configured one
    #[arg(short, long)]
    pub probes: Option<u32>,
}

pub fn handle_threshold_command(args: ThresholdArgs, config: &StaleConfig) -> Result<()> {
    let probes = resolve(args.probes, config)?;
    print!("{}", render(probes));
    Ok(())
}

fn resolve(probes: Option<u32>, config: &StaleConfig) -> Result<ProbeCount> {
    match probes {
        Some(value) => ProbeCount::new(value).context("--probes must be at least 1"),
        None => Ok(config.probe_count()?),
    }
}

fn render(probes: ProbeCount) -> String {
    let mut out = format!(
        "probes: {probes}\nthreshold: {} votes\n\nvotes  majority\n",
        probes.threshold()
    );
    for votes in 0..=probes.get() {
        let mark = if probes.majority(votes) { "yes" } else { "no" };
        out.push_str(&format!("{votes:>5}  {mark}\n"));
    }
    if probes.threshold() > probes.get() {
        out.push_str("\nno tally can reach a majority; every decline ends inconclusive\n");
    }
    out
}
