//! Deadline tracking for outbound requests

use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use crate::error::{Error, ErrorCode};

/// Tracks the deadline of a single outbound request.
///
/// The window starts at registration time and fires `RequestTimeout` when it
/// elapses. When `reset_on_progress` is set, every routed progress
/// notification rearms the window for another full `timeout`, while the
/// cumulative elapsed time stays bounded by `max_total`.
pub(crate) struct TimeoutWindow {
    timeout: Duration,
    max_total: Option<Duration>,
    reset_on_progress: bool,
    started: Instant,
    deadline: Instant,
}

impl TimeoutWindow {
    /// Opens a new window starting now
    pub(crate) fn new(
        timeout: Duration,
        max_total: Option<Duration>,
        reset_on_progress: bool,
    ) -> Self {
        let started = Instant::now();
        Self {
            timeout,
            max_total,
            reset_on_progress,
            started,
            deadline: started + timeout,
        }
    }

    /// The instant the window fires at
    #[inline]
    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Registers a progress observation.
    ///
    /// Rearms the deadline when reset-on-progress is enabled. Once the
    /// cumulative elapsed time reaches `max_total`, returns the ceiling error
    /// carrying `{maxTotalTimeout, totalElapsed}`.
    pub(crate) fn on_progress(&mut self) -> Result<(), Error> {
        if !self.reset_on_progress {
            return Ok(());
        }

        let now = Instant::now();
        if let Some(max_total) = self.max_total {
            let elapsed = now - self.started;
            if elapsed >= max_total {
                return Err(Error::new(
                    ErrorCode::RequestTimeout,
                    "Maximum total timeout exceeded")
                    .with_data(json!({
                        "maxTotalTimeout": max_total.as_millis() as u64,
                        "totalElapsed": elapsed.as_millis() as u64,
                    })));
            }
        }

        self.deadline = now + self.timeout;
        Ok(())
    }

    /// The error produced when the window fires
    pub(crate) fn expired(&self) -> Error {
        Error::new(
            ErrorCode::RequestTimeout,
            format!("Request timed out after {} ms of inactivity", self.timeout.as_millis()))
    }
}
