//! Push metrics for the external telemetry agent.

use std::sync::Arc;
use std::time::Duration;

use beacon_statsd::{CounterMetric, MetricsClient, TimerMetric, metric};

/// Sends counters and timers to the statsd agent.
///
/// Sending is fire-and-forget. Metrics are queued for a background sender and dropped with a
/// warning when the queue is full, so calls never block or fail the caller.
#[derive(Clone, Debug)]
pub struct ExternalTelemetry {
    client: Arc<MetricsClient>,
}

impl ExternalTelemetry {
    /// Creates a sink sending through the given client.
    pub fn new(client: Arc<MetricsClient>) -> Self {
        Self { client }
    }

    /// Increments a counter by one.
    pub fn increment(&self, counter: impl CounterMetric) {
        metric!(&self.client, counter(counter) += 1);
    }

    /// Records a duration for a timer.
    pub fn timing(&self, timer: impl TimerMetric, duration: Duration) {
        metric!(&self.client, timer(timer) = duration);
    }
}
