use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stale_core::{Reading, ReadingSource, RequestError};

#[derive(Debug)]
struct ScriptState<R> {
    script: VecDeque<Result<R, RequestError>>,
    fallback: Option<Result<R, RequestError>>,
    calls: usize,
    in_flight: usize,
    max_in_flight: usize,
}

/// Reading source that replays a script.
///
/// Once the script is drained, the fallback set by [`ScriptedSource::repeat`]
/// is returned forever; without one, requests fail with "script exhausted".
#[derive(Debug, Clone)]
pub struct ScriptedSource<R> {
    state: Arc<Mutex<ScriptState<R>>>,
    delay: Option<Duration>,
}

impl<R: Reading> ScriptedSource<R> {
    /// Empty script
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                script: VecDeque::new(),
                fallback: None,
                calls: 0,
                in_flight: 0,
                max_in_flight: 0,
            })),
            delay: None,
        }
    }

    /// Script that returns `readings` in order
    pub fn from_readings(readings: impl IntoIterator<Item = R>) -> Self {
        let source = Self::new();
        for reading in readings {
            source.push_ok(reading);
        }
        source
    }

    /// Sleep for `delay` inside every request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append a successful reading
    pub fn push_ok(&self, reading: R) -> &Self {
        self.state.lock().script.push_back(Ok(reading));
        self
    }

    /// Append a failed request
    pub fn push_err(&self, message: &str) -> &Self {
        self.state
            .lock()
            .script
            .push_back(Err(RequestError::new(message)));
        self
    }

    /// Return `reading` whenever the script is empty
    pub fn repeat(&self, reading: R) -> &Self {
        self.state.lock().fallback = Some(Ok(reading));
        self
    }

    /// Requests served so far
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    /// Highest number of requests that were in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    /// Scripted entries not yet served
    pub fn remaining(&self) -> usize {
        self.state.lock().script.len()
    }
}

impl<R: Reading> Default for ScriptedSource<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Reading> ReadingSource<R> for ScriptedSource<R> {
    async fn request(&self) -> Result<R, RequestError> {
        let next = {
            let mut state = self.state.lock();
            state.calls += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state
                .script
                .pop_front()
                .or_else(|| state.fallback.clone())
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.state.lock().in_flight -= 1;
        tracing::trace!(ok = matches!(next, Some(Ok(_))), "scripted request served");
        next.unwrap_or_else(|| Err(RequestError::new("script exhausted")))
    }
}
