//! Stale core prelude.
//!
//! Curated re-exports for wiring a policy.

pub use crate::effects::{commit_fn, compare_fn, error_fn, source_fn};
pub use crate::{
    CommitSink, Comparator, CycleOutcome, ErrorHandler, IntervalPoller, Outcome, OutcomeSink,
    ProbeCount, Reading, ReadingSource, RequestError, StaleConfig, StaleError, StalePolicy, Tally,
    Verdict,
};
