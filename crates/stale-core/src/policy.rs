//! Stale-state policy
//!
//! Decides whether a reading that diverges from the committed one is genuine
//! new server state or a stale replica answering late.
//!
//! # Cycle
//!
//! 1. `fetch` asks the [`ReadingSource`] for a reading.
//! 2. The [`Comparator`] signals accept, decline or same against the
//!    committed reading.
//! 3. Accept commits immediately, same is ignored.
//! 4. Decline starts a verification: `probe_count` further readings are
//!    requested one after another and compared against the *pre-decline*
//!    baseline. The tally then decides:
//!    - same majority: keep the committed state
//!    - decline majority: commit the declined reading
//!    - accept majority: fetch again
//!    - no majority: keep the committed state
//!
//! # Concurrency
//!
//! Probes within one verification are strictly sequential. Cycles on the
//! same policy may overlap. A commit carries the generation of the baseline
//! it was decided against and is published under the write lock only if
//! that generation is still current. When another cycle committed first,
//! the reading is compared again against the newly committed one: it is
//! published if that comparison accepts and dropped as
//! [`CycleOutcome::Superseded`] otherwise.
//!
//! The commit sink is notified after the write lock is released, so a sink
//! may call back into the policy. A sink is not notified of a reading that a
//! newer commit already replaced.
//!
//! # Lock Usage
//!
//! Capability slots sit behind a `parking_lot::RwLock` that is only held to
//! clone an `Arc` out and never across `.await`. The committed reading uses
//! an `async_lock::RwLock`; no lock is held while a capability runs.

use std::fmt;
use std::sync::Arc;

use async_lock::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::StaleConfig;
use crate::effects::{
    CommitSink, Comparator, ErrorHandler, Reading, ReadingSource, SilentErrors,
};
use crate::errors::{Capability, RequestError, Result, StaleError};
use crate::outcome::{Outcome, OutcomeSink};
use crate::quorum::{self, ProbeCount, Tally, Verdict};

/// How one fetch or compare cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The reading was accepted and committed
    Accepted,
    /// The reading matched the committed state
    Unchanged,
    /// The reading was declined and verification reached `verdict`
    Verified {
        /// Votes collected while verifying
        tally: Tally,
        /// Decision applied to the declined reading
        verdict: Verdict,
    },
    /// Probes kept seeing newer data until the refetch bound was hit
    RefetchLimitReached {
        /// Tally of the last verification
        tally: Tally,
    },
    /// Another cycle committed first and the reading does not compare as
    /// newer than that commit; it was dropped
    Superseded,
    /// The reading source failed; reported through the error handler
    RequestFailed(RequestError),
    /// The comparator signalled nothing; reported through the error handler
    ComparatorSilent,
}

impl CycleOutcome {
    /// Whether this cycle committed a reading
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Accepted
                | CycleOutcome::Verified {
                    verdict: Verdict::AdoptDeclined,
                    ..
                }
        )
    }
}

enum Step {
    Done(CycleOutcome),
    Refetch(Tally),
}

struct Capabilities<R: Reading> {
    request: Option<Arc<dyn ReadingSource<R>>>,
    compare: Option<Arc<dyn Comparator<R>>>,
    commit: Option<Arc<dyn CommitSink<R>>>,
    error: Arc<dyn ErrorHandler>,
}

impl<R: Reading> Default for Capabilities<R> {
    fn default() -> Self {
        Self {
            request: None,
            compare: None,
            commit: None,
            error: Arc::new(SilentErrors),
        }
    }
}

struct Committed<R> {
    reading: Option<R>,
    /// Bumped on every commit
    generation: u64,
}

/// Comparison-and-polling policy guarding a consumer against stale reads.
pub struct StalePolicy<R: Reading> {
    config: StaleConfig,
    probe_count: ProbeCount,
    capabilities: parking_lot::RwLock<Capabilities<R>>,
    committed: RwLock<Committed<R>>,
    /// Bumped after every top-level request
    fetches: watch::Sender<u64>,
}

impl<R: Reading> StalePolicy<R> {
    /// Create a policy with empty capability slots.
    ///
    /// `request`, `compare` and `commit` must be registered before the first
    /// fetch; using an empty slot fails with [`StaleError::MissingCapability`].
    pub fn new(config: StaleConfig) -> Result<Self> {
        config.validate()?;
        let probe_count = config.probe_count()?;
        Ok(Self {
            config,
            probe_count,
            capabilities: parking_lot::RwLock::new(Capabilities::default()),
            committed: RwLock::new(Committed {
                reading: None,
                generation: 0,
            }),
            fetches: watch::channel(0).0,
        })
    }

    /// Create a fully wired policy.
    pub fn with_capabilities<S, C, K>(
        config: StaleConfig,
        source: S,
        comparator: C,
        sink: K,
    ) -> Result<Self>
    where
        S: ReadingSource<R> + 'static,
        C: Comparator<R> + 'static,
        K: CommitSink<R> + 'static,
    {
        let policy = Self::new(config)?;
        policy
            .set_request(source)
            .set_compare(comparator)
            .set_commit(sink);
        Ok(policy)
    }

    /// Seed the committed reading without notifying the sink.
    pub fn with_previous(mut self, reading: R) -> Self {
        self.committed.get_mut().reading = Some(reading);
        self
    }

    /// Replace the reading source
    pub fn set_request<S: ReadingSource<R> + 'static>(&self, source: S) -> &Self {
        self.capabilities.write().request = Some(Arc::new(source));
        self
    }

    /// Replace the comparator
    pub fn set_compare<C: Comparator<R> + 'static>(&self, comparator: C) -> &Self {
        self.capabilities.write().compare = Some(Arc::new(comparator));
        self
    }

    /// Replace the commit sink
    pub fn set_commit<K: CommitSink<R> + 'static>(&self, sink: K) -> &Self {
        self.capabilities.write().commit = Some(Arc::new(sink));
        self
    }

    /// Replace the error handler
    pub fn set_error<E: ErrorHandler + 'static>(&self, handler: E) -> &Self {
        self.capabilities.write().error = Arc::new(handler);
        self
    }

    /// Configuration this policy was built from
    pub fn config(&self) -> &StaleConfig {
        &self.config
    }

    /// Diagnostic name, if configured
    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// Probes issued per verification
    pub fn probe_count(&self) -> ProbeCount {
        self.probe_count
    }

    /// Whether `votes` holds the majority for this policy's probe count.
    pub fn majority(&self, votes: u32) -> bool {
        self.probe_count.majority(votes)
    }

    /// The committed reading
    pub async fn previous(&self) -> Option<R> {
        self.committed.read().await.reading.clone()
    }

    /// Number of commits since construction (seeding does not count)
    pub async fn generation(&self) -> u64 {
        self.committed.read().await.generation
    }

    /// Receiver that changes after every top-level request, including the
    /// requests issued by a refetch.
    pub fn fetch_signal(&self) -> watch::Receiver<u64> {
        self.fetches.subscribe()
    }

    /// Run one request → compare → (verify) → (commit) cycle to completion.
    ///
    /// Request failures, silent comparators and inconclusive verifications are
    /// contained and reported through the error handler. Only a missing
    /// capability is returned as `Err`.
    #[tracing::instrument(level = "debug", skip_all, fields(policy = %self.config.label()))]
    pub async fn fetch(&self) -> Result<CycleOutcome> {
        self.drive(None).await
    }

    /// Start a fetch cycle in the background and return immediately.
    pub fn spawn_fetch(self: &Arc<Self>) -> JoinHandle<Result<CycleOutcome>> {
        let policy = Arc::clone(self);
        tokio::spawn(async move { policy.fetch().await })
    }

    /// Run the decision cycle for a reading obtained outside the policy.
    #[tracing::instrument(level = "debug", skip_all, fields(policy = %self.config.label()))]
    pub async fn compare(&self, reading: R) -> Result<CycleOutcome> {
        self.drive(Some(reading)).await
    }

    /// Issue `probe_count` sequential probes against `baseline` and tally them.
    ///
    /// A failed request or a comparator that signals nothing counts as a
    /// decline; neither aborts the round.
    #[tracing::instrument(level = "debug", skip_all, fields(policy = %self.config.label()))]
    pub async fn verify(&self, baseline: Option<&R>) -> Result<Tally> {
        let source = self.source()?;
        let comparator = self.comparator()?;
        let mut tally = Tally::default();

        for remaining in (0..self.probe_count.get()).rev() {
            tracing::trace!(remaining, "starting verification request");

            let reading = match source.request().await {
                Ok(reading) => reading,
                Err(error) => {
                    tracing::debug!(
                        %error,
                        "received an error while requesting data for verify, marking as incorrect"
                    );
                    tally.record_failure();
                    continue;
                }
            };

            let outcome = OutcomeSink::new();
            comparator.compare(baseline, &reading, &outcome).await;
            match outcome.into_outcome() {
                Some(outcome) => tally.record(outcome),
                None => {
                    tracing::debug!("comparator stayed silent during verify, marking as incorrect");
                    tally.record_failure();
                }
            }
        }

        tracing::debug!(
            accept = tally.accept,
            decline = tally.decline,
            same = tally.same,
            "verification step complete"
        );
        Ok(tally)
    }

    async fn drive(&self, mut pending: Option<R>) -> Result<CycleOutcome> {
        let mut refetches = 0u32;
        loop {
            let reading = match pending.take() {
                Some(reading) => reading,
                None => {
                    let source = self.source()?;
                    let requested = source.request().await;
                    self.fetches.send_modify(|count| *count = count.wrapping_add(1));
                    match requested {
                        Ok(reading) => reading,
                        Err(error) => {
                            tracing::debug!(%error, "received an error while retrieving data");
                            self.report(&StaleError::Request(error.clone()));
                            return Ok(CycleOutcome::RequestFailed(error));
                        }
                    }
                }
            };

            match self.evaluate(reading).await? {
                Step::Done(outcome) => return Ok(outcome),
                Step::Refetch(tally) => {
                    if refetches >= self.config.max_refetches {
                        tracing::warn!(
                            refetches,
                            %tally,
                            "refetch limit reached, keeping committed state"
                        );
                        return Ok(CycleOutcome::RefetchLimitReached { tally });
                    }
                    refetches += 1;
                    tracing::debug!(refetches, %tally, "probes see newer data, fetching again");
                }
            }
        }
    }

    async fn evaluate(&self, reading: R) -> Result<Step> {
        let comparator = self.comparator()?;
        let (previous, generation) = self.snapshot().await;

        let sink = OutcomeSink::new();
        comparator.compare(previous.as_ref(), &reading, &sink).await;

        let Some(outcome) = sink.into_outcome() else {
            tracing::warn!("comparator returned without signalling an outcome");
            self.report(&StaleError::ComparatorSilent);
            return Ok(Step::Done(CycleOutcome::ComparatorSilent));
        };

        match outcome {
            Outcome::Accept => {
                tracing::debug!("received data was accepted, committing");
                self.settle(reading, generation, CycleOutcome::Accepted)
                    .await
                    .map(Step::Done)
            }
            Outcome::Same => {
                tracing::debug!("the received state was the same, ignoring change");
                Ok(Step::Done(CycleOutcome::Unchanged))
            }
            Outcome::Decline => {
                tracing::debug!("received data was declined, starting verification");
                let tally = self.verify(previous.as_ref()).await?;
                let verdict = quorum::decide(&tally, self.probe_count);

                match verdict {
                    Verdict::KeepPrevious => {
                        tracing::debug!(%tally, "probes match the committed state, ignoring decline");
                    }
                    Verdict::AdoptDeclined => {
                        tracing::debug!(
                            %tally,
                            "majority of probes also decline, treating it as the new server state"
                        );
                        return self
                            .settle(reading, generation, CycleOutcome::Verified { tally, verdict })
                            .await
                            .map(Step::Done);
                    }
                    Verdict::Refetch => return Ok(Step::Refetch(tally)),
                    Verdict::Inconclusive => {
                        tracing::debug!(%tally, "received inconsistent server responses, ignoring for now");
                        if self.config.report_inconclusive {
                            self.report(&StaleError::ConsensusInconclusive { tally });
                        }
                    }
                }

                Ok(Step::Done(CycleOutcome::Verified { tally, verdict }))
            }
        }
    }

    /// Commit `reading` and return `outcome`, or `Superseded` if another
    /// commit replaced the baseline and `reading` does not compare as newer.
    async fn settle(
        &self,
        reading: R,
        baseline_generation: u64,
        outcome: CycleOutcome,
    ) -> Result<CycleOutcome> {
        if self.commit(reading, baseline_generation).await? {
            Ok(outcome)
        } else {
            Ok(CycleOutcome::Superseded)
        }
    }

    async fn commit(&self, reading: R, mut baseline_generation: u64) -> Result<bool> {
        let sink = self.commit_sink()?;
        let comparator = self.comparator()?;

        let generation = loop {
            {
                let mut committed = self.committed.write().await;
                if committed.generation == baseline_generation {
                    committed.reading = Some(reading.clone());
                    committed.generation += 1;
                    break committed.generation;
                }
            }

            let (current, generation) = self.snapshot().await;
            tracing::debug!(
                baseline_generation,
                current_generation = generation,
                "baseline changed while deciding, comparing again"
            );
            let outcome = OutcomeSink::new();
            comparator.compare(current.as_ref(), &reading, &outcome).await;
            if outcome.into_outcome() != Some(Outcome::Accept) {
                tracing::debug!("reading is not newer than the latest commit, dropping it");
                return Ok(false);
            }
            baseline_generation = generation;
        };

        if self.generation().await != generation {
            tracing::debug!(generation, "a newer commit landed first, skipping notification");
            return Ok(true);
        }
        sink.commit(&reading).await;
        Ok(true)
    }

    async fn snapshot(&self) -> (Option<R>, u64) {
        let committed = self.committed.read().await;
        (committed.reading.clone(), committed.generation)
    }

    fn report(&self, error: &StaleError) {
        let handler = Arc::clone(&self.capabilities.read().error);
        handler.handle(error);
    }

    fn source(&self) -> Result<Arc<dyn ReadingSource<R>>> {
        self.capabilities
            .read()
            .request
            .clone()
            .ok_or_else(|| StaleError::missing(Capability::Request))
    }

    fn comparator(&self) -> Result<Arc<dyn Comparator<R>>> {
        self.capabilities
            .read()
            .compare
            .clone()
            .ok_or_else(|| StaleError::missing(Capability::Compare))
    }

    fn commit_sink(&self) -> Result<Arc<dyn CommitSink<R>>> {
        self.capabilities
            .read()
            .commit
            .clone()
            .ok_or_else(|| StaleError::missing(Capability::Commit))
    }
}

impl<R: Reading> fmt::Debug for StalePolicy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StalePolicy")
            .field("config", &self.config)
            .field("probe_count", &self.probe_count)
            .finish_non_exhaustive()
    }
}
