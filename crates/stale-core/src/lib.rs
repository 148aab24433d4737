#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! # Stale Core - Quorum Verification for Stale Replica Reads
//!
//! A client polling a replicated, eventually-consistent source cannot tell a
//! genuine change from a lagging replica by looking at one reading. This crate
//! provides [`StalePolicy`], which commits readings that compare as newer,
//! ignores readings that compare as unchanged, and only trusts a reading that
//! compares as *older* once a super-majority of follow-up probes confirms it.
//!
//! ## Architecture
//!
//! - **quorum**: Pure threshold, tally and verdict functions
//! - **outcome**: Comparison outcomes and the write-once outcome sink
//! - **effects**: Capability traits the application wires in
//! - **policy**: The fetch / compare / verify / commit state machine
//! - **poller**: Optional interval driver for `fetch`
//! - **config**: Configuration loading and validation
//!
//! ## Example
//!
//! ```rust,no_run
//! use stale_core::prelude::*;
//!
//! # async fn example() -> Result<(), StaleError> {
//! let policy = StalePolicy::with_capabilities(
//!     StaleConfig::named("feed"),
//!     source_fn(|| async { Ok::<u64, RequestError>(42) }),
//!     compare_fn(|previous: Option<&u64>, current: &u64, out: &OutcomeSink| {
//!         match previous {
//!             Some(p) if current < p => out.decline(),
//!             Some(p) if current == p => out.same(),
//!             _ => out.accept(),
//!         };
//!     }),
//!     commit_fn(|version: &u64| println!("now at {version}")),
//! )?;
//!
//! let outcome = policy.fetch().await?;
//! assert!(outcome.is_committed());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod effects;
pub mod errors;
pub mod outcome;
pub mod poller;
pub mod policy;
pub mod prelude;
pub mod quorum;

pub use config::StaleConfig;
pub use effects::{
    commit_fn, compare_fn, error_fn, source_fn, CommitSink, Comparator, ErrorHandler, Reading,
    ReadingSource, SilentErrors,
};
pub use errors::{Capability, RequestError, Result, StaleError};
pub use outcome::{Outcome, OutcomeSink};
pub use poller::IntervalPoller;
pub use policy::{CycleOutcome, StalePolicy};
pub use quorum::{has_majority, majority_threshold, ProbeCount, Tally, Verdict};
