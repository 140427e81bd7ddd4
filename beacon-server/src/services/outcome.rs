//! Request processing behind the request handler.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use rand::Rng;

/// Performs the work for a request and decides its status.
///
/// The request handler measures the time spent in [`process`](Self::process) and records
/// telemetry for the returned status.
#[async_trait]
pub trait OutcomeGenerator: fmt::Debug + Send + Sync {
    /// Processes a request for `path` and returns the response status.
    async fn process(&self, path: &str) -> StatusCode;
}

/// Simulates work with a random delay and random server errors.
#[derive(Clone, Debug)]
pub struct SimulatedOutcomes {
    max_delay: Duration,
    error_rate: f64,
}

impl SimulatedOutcomes {
    /// Creates a simulation that sleeps up to `max_delay` and fails with probability
    /// `error_rate`.
    pub fn new(max_delay: Duration, error_rate: f64) -> Self {
        Self {
            max_delay,
            error_rate,
        }
    }
}

#[async_trait]
impl OutcomeGenerator for SimulatedOutcomes {
    async fn process(&self, _path: &str) -> StatusCode {
        let (delay, failed) = {
            let mut rng = rand::rng();
            let max_millis = self.max_delay.as_millis() as u64;
            let delay = match max_millis {
                0 => Duration::ZERO,
                max => Duration::from_millis(rng.random_range(0..max)),
            };
            (delay, rng.random::<f64>() < self.error_rate)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if failed {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }
}
