//! Pure Quorum Arithmetic
//!
//! Effect-free threshold, tally and decision functions used by verification.
//!
//! ## Design Principles
//! 1. Pure functions: `fn(tally, probe_count) -> Verdict`
//! 2. No side effects: requests and commits happen in the policy layer
//! 3. Deterministic: same inputs always produce same outputs
//!
//! The majority threshold is `ceil(probe_count / 2) + 1`, one vote above a
//! plain "more than half" quorum. Absent that super-majority nothing is
//! committed.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;

/// Votes needed for a bucket to hold the majority of `probe_count` probes.
///
/// A zero probe count yields a threshold of one.
pub fn majority_threshold(probe_count: u32) -> u32 {
    probe_count.div_ceil(2).saturating_add(1)
}

/// Whether `votes` reaches the majority threshold for `probe_count` probes.
pub fn has_majority(probe_count: u32, votes: u32) -> bool {
    votes >= majority_threshold(probe_count)
}

/// Non-zero number of probes issued per verification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProbeCount(NonZeroU32);

impl ProbeCount {
    /// Default number of probes per verification
    pub const DEFAULT: u32 = 6;

    /// Create a probe count, rejecting zero.
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Raw probe count.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Majority threshold for this probe count.
    pub fn threshold(self) -> u32 {
        majority_threshold(self.get())
    }

    /// Whether `votes` holds the majority.
    pub fn majority(self, votes: u32) -> bool {
        has_majority(self.get(), votes)
    }
}

impl Default for ProbeCount {
    fn default() -> Self {
        Self(NonZeroU32::new(Self::DEFAULT).unwrap_or(NonZeroU32::MIN))
    }
}

impl fmt::Display for ProbeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Outcome counts collected across one verification.
///
/// Request failures and silent comparators are folded into `decline`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tally {
    /// Probes that looked newer than the baseline
    pub accept: u32,
    /// Probes that looked older than the baseline, or failed
    pub decline: u32,
    /// Probes indistinguishable from the baseline
    pub same: u32,
}

impl Tally {
    /// Count one signalled outcome.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Accept => self.accept += 1,
            Outcome::Decline => self.decline += 1,
            Outcome::Same => self.same += 1,
        }
    }

    /// Count a probe that produced no usable outcome.
    pub fn record_failure(&mut self) {
        self.decline += 1;
    }

    /// Total probes counted.
    pub fn total(&self) -> u32 {
        self.accept
            .saturating_add(self.decline)
            .saturating_add(self.same)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accept, {} decline, {} same",
            self.accept, self.decline, self.same
        )
    }
}

/// Decision taken after verifying a declined reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Probes agree with the committed state; the decline was transient
    KeepPrevious,
    /// Probes agree with the declined reading; it is the new server state
    AdoptDeclined,
    /// Probes see newer state than the baseline; fetch again
    Refetch,
    /// No bucket reached the majority
    Inconclusive,
}

/// Apply the post-verification policy to a tally.
///
/// Buckets are checked in order `same`, `decline`, `accept`.
pub fn decide(tally: &Tally, probe_count: ProbeCount) -> Verdict {
    if probe_count.majority(tally.same) {
        Verdict::KeepPrevious
    } else if probe_count.majority(tally.decline) {
        Verdict::AdoptDeclined
    } else if probe_count.majority(tally.accept) {
        Verdict::Refetch
    } else {
        Verdict::Inconclusive
    }
}
