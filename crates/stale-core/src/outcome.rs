//! Comparison outcomes and the single-assignment outcome sink.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Result of comparing a new reading against the committed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The new reading is newer or better
    Accept,
    /// The new reading looks like a regression
    Decline,
    /// No meaningful difference
    Same,
}

/// Write-once cell a comparator signals its outcome through.
///
/// The first signal wins. Later signals on the same sink are ignored and
/// report `false`.
#[derive(Debug, Default)]
pub struct OutcomeSink {
    cell: OnceLock<Outcome>,
}

impl OutcomeSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that the new reading should be accepted
    pub fn accept(&self) -> bool {
        self.signal(Outcome::Accept)
    }

    /// Signal that the new reading looks like a regression
    pub fn decline(&self) -> bool {
        self.signal(Outcome::Decline)
    }

    /// Signal that nothing meaningful changed
    pub fn same(&self) -> bool {
        self.signal(Outcome::Same)
    }

    /// Record `outcome` unless one was already signalled.
    pub fn signal(&self, outcome: Outcome) -> bool {
        let recorded = self.cell.set(outcome).is_ok();
        if !recorded {
            tracing::trace!(
                ?outcome,
                first = ?self.cell.get(),
                "outcome already signalled, ignoring"
            );
        }
        recorded
    }

    /// The signalled outcome, if any
    pub fn outcome(&self) -> Option<Outcome> {
        self.cell.get().copied()
    }

    /// Consume the sink and return the signalled outcome
    pub fn into_outcome(self) -> Option<Outcome> {
        self.cell.into_inner()
    }
}
