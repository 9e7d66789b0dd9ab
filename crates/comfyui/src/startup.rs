//! Startup readiness probe with exponential backoff.
//!
//! The backend takes a while to come up (model scanning, custom node
//! imports). [`wait_until_ready`] polls the readiness endpoint with
//! growing delays until the backend answers, the overall deadline
//! passes, or the [`CancellationToken`] fires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::ComfyUIApi;

/// Tunable parameters for the backoff strategy.
pub struct ReadyProbe {
    /// Delay before the second attempt (the first fires immediately).
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Give up entirely after this much elapsed time.
    pub deadline: Duration,
}

impl Default for ReadyProbe {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            deadline: Duration::from_secs(300),
        }
    }
}

/// Why the probe gave up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Backend not ready after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Readiness probe cancelled")]
    Cancelled,
}

/// Calculate the next backoff delay, clamped to [`ReadyProbe::max_delay`].
pub fn next_delay(current: Duration, probe: &ReadyProbe) -> Duration {
    let next_ms = (current.as_millis() as f64 * probe.multiplier) as u64;
    Duration::from_millis(next_ms).min(probe.max_delay)
}

/// Poll the backend until it answers the readiness endpoint.
pub async fn wait_until_ready(
    api: &ComfyUIApi,
    probe: &ReadyProbe,
    cancel: &CancellationToken,
) -> Result<(), StartupError> {
    let started = tokio::time::Instant::now();
    let mut delay = probe.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Readiness probe cancelled");
                return Err(StartupError::Cancelled);
            }
            result = api.ping() => {
                match result {
                    Ok(()) => {
                        tracing::info!(attempt, "Backend is ready");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Backend not ready yet",
                        );
                    }
                }
            }
        }

        if started.elapsed() >= probe.deadline {
            return Err(StartupError::DeadlineExceeded(probe.deadline));
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return Err(StartupError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, probe);
    }
}
