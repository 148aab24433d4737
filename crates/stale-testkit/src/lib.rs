//! # Stale Testkit
//!
//! Deterministic capability implementations for exercising
//! [`StalePolicy`](stale_core::StalePolicy) in tests:
//!
//! - [`ScriptedSource`]: replays a queue of readings and failures, counting
//!   calls and the peak number of concurrent requests
//! - [`VersionComparator`]: orders [`Versioned`] readings by version;
//!   [`SlowVersionComparator`] does the same after a delay on chosen versions
//! - [`CountingComparator`], [`SilentComparator`], [`RepeatingComparator`]:
//!   comparator wrappers and misbehaving comparators
//! - [`RecordingSink`], [`RecordingErrors`]: capture commits and reported errors
//!
//! Every type is a cheap handle around shared state; clone it, hand one copy
//! to the policy and keep the other for assertions.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` because this is test infrastructure and locks are
//! never held across `.await` points.

mod compare;
mod recorders;
mod source;

pub use compare::{
    v, CountingComparator, RepeatingComparator, SilentComparator, SlowVersionComparator,
    VersionComparator, Versioned,
};
pub use recorders::{RecordingErrors, RecordingSink};
pub use source::ScriptedSource;
