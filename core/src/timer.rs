//! Per-request wall-clock timing.
//!
//! A [`Timer`] records a monotonic start instant for a request identity and,
//! when stopped, attaches the elapsed seconds to the request under
//! [`TIMER_PARAMETER`]. Starts are keyed by [`RequestId`], so any number of
//! requests from the same batch may be started before any is stopped.
//!
//! `start`/`stop` must be strictly paired. Stopping a request that was never
//! started, or starting one twice, is a pipeline wiring defect and is
//! reported as a precondition [`PipelineError`].

use crate::error::{PipelineError, Result};
use crate::message::{Request, RequestId, TIMER_PARAMETER, TIMER_START_PARAMETER};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Measures how long requests take.
pub trait Timer: Send + Sync {
    /// Start timing `request` and return it tagged as started.
    ///
    /// # Errors
    ///
    /// [`PipelineError::TimerAlreadyStarted`] if the request is already running.
    fn start(&self, request: Request) -> Result<Request>;

    /// Stop timing `request` and return it carrying the elapsed time.
    ///
    /// # Errors
    ///
    /// [`PipelineError::TimerNotStarted`] if no matching start was recorded.
    fn stop(&self, request: Request) -> Result<Request>;

    /// Forget a running timer without producing a measurement.
    ///
    /// Returns whether a timer was running for `id`.
    fn discard(&self, id: RequestId) -> bool;

    /// Whether a timer is running for `id`.
    fn is_running(&self, id: RequestId) -> bool;
}

/// [`Timer`] backed by [`Instant`].
#[derive(Debug, Default)]
pub struct StopwatchTimer {
    started: Mutex<HashMap<RequestId, Instant>>,
}

impl StopwatchTimer {
    /// Create a timer with no running measurements.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of running measurements.
    #[must_use]
    pub fn running(&self) -> usize {
        self.started
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Timer for StopwatchTimer {
    fn start(&self, request: Request) -> Result<Request> {
        let id = request.id();
        {
            let mut started = self
                .started
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if started.contains_key(&id) {
                return Err(PipelineError::TimerAlreadyStarted(id));
            }
            started.insert(id, Instant::now());
        }

        tracing::trace!(request_id = %id, "Timer started");

        #[allow(clippy::cast_precision_loss)]
        let wall_clock = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        Ok(request
            .without_parameter(TIMER_PARAMETER)
            .with_parameter(TIMER_START_PARAMETER, wall_clock))
    }

    fn stop(&self, request: Request) -> Result<Request> {
        let id = request.id();
        let start = self
            .started
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&id)
            .ok_or(PipelineError::TimerNotStarted(id))?;

        let elapsed = start.elapsed();
        tracing::trace!(
            request_id = %id,
            elapsed_ms = elapsed.as_millis(),
            "Timer stopped"
        );

        Ok(request.with_parameter(TIMER_PARAMETER, elapsed.as_secs_f64()))
    }

    fn discard(&self, id: RequestId) -> bool {
        self.started
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    fn is_running(&self, id: RequestId) -> bool {
        self.started
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(&id)
    }
}
