//! Telemetry recorded for every handled request.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use beacon_sampling::{SamplingController, SamplingDecision};
use chrono::Utc;

use crate::services::logs::{LogEmitter, LogEvent};
use crate::services::metrics::MetricsSink;
use crate::services::telemetry::ExternalTelemetry;
use crate::statsd::{ServiceCounters, ServiceTimers};

/// The result of handling a single request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOutcome {
    /// Path of the request.
    pub path: String,
    /// Status of the response.
    pub status: StatusCode,
    /// Time spent handling the request.
    pub latency: Duration,
}

impl RequestOutcome {
    /// Returns `true` if the request failed with a server error.
    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 500
    }
}

/// Fans out a request outcome to all telemetry sinks.
///
/// Aggregate metrics are always recorded. Push metrics and log events for successful requests
/// depend on a sampling decision, which is made exactly once per request. Errors are always
/// pushed and logged.
#[derive(Debug)]
pub struct TelemetryPipeline {
    sampling: Arc<SamplingController>,
    metrics: MetricsSink,
    external: ExternalTelemetry,
    logs: LogEmitter,
    service: String,
    environment: String,
}

impl TelemetryPipeline {
    /// Creates a pipeline from its sinks.
    pub fn new(
        sampling: Arc<SamplingController>,
        metrics: MetricsSink,
        external: ExternalTelemetry,
        logs: LogEmitter,
        service: String,
        environment: String,
    ) -> Self {
        Self {
            sampling,
            metrics,
            external,
            logs,
            service,
            environment,
        }
    }

    /// Returns the aggregate metrics sink.
    pub fn metrics(&self) -> &MetricsSink {
        &self.metrics
    }

    /// Records telemetry for a handled request and returns the sampling decision.
    ///
    /// Nothing in here blocks or fails.
    pub fn record(&self, outcome: &RequestOutcome) -> SamplingDecision {
        let is_error = outcome.is_error();

        self.metrics.record_request();
        self.metrics.record_latency(outcome.latency);
        if is_error {
            self.metrics.record_error();
        }

        let decision = self.sampling.decide();

        if decision.is_keep() {
            self.external.increment(ServiceCounters::Requests);
            self.external
                .timing(ServiceTimers::RequestDuration, outcome.latency);
        }
        if is_error {
            self.external.increment(ServiceCounters::Errors);
        }

        if is_error || decision.is_keep() {
            let event = LogEvent::new(&self.service, &self.environment, outcome, Utc::now());
            self.logs.emit(&event);
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::logs::EventLevel;
    use crate::testutils::TestSinks;

    fn outcome(status: StatusCode) -> RequestOutcome {
        RequestOutcome {
            path: "/".to_owned(),
            status,
            latency: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_error_always_counted_and_logged() {
        let mut sinks = TestSinks::new(0.0);

        let decision = sinks.pipeline.record(&outcome(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(decision, SamplingDecision::Drop);

        let snapshot = sinks.pipeline.metrics().snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.latency_count, 1);

        assert_eq!(sinks.statsd_lines(), ["errors:1|c|#env:dev,service:api"]);

        let logs = sinks.log_lines();
        assert_eq!(logs.len(), 1);
        let event: LogEvent<'_> = serde_json::from_str(&logs[0]).unwrap();
        assert_eq!(event.level, EventLevel::Error);
        assert_eq!(event.status, 500);
        assert_eq!(event.latency_ms, 12.0);
    }

    #[test]
    fn test_unsampled_success_only_aggregates() {
        let mut sinks = TestSinks::new(0.0);

        sinks.pipeline.record(&outcome(StatusCode::OK));

        let snapshot = sinks.pipeline.metrics().snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.latency_count, 1);
        assert!(sinks.statsd_lines().is_empty());
        assert!(sinks.log_lines().is_empty());
    }

    #[test]
    fn test_sampled_success_pushes_and_logs() {
        let mut sinks = TestSinks::new(1.0);

        let decision = sinks.pipeline.record(&outcome(StatusCode::OK));
        assert_eq!(decision, SamplingDecision::Keep);

        assert_eq!(
            sinks.statsd_lines(),
            [
                "requests:1|c|#env:dev,service:api",
                "request_duration_ms:12|ms|#env:dev,service:api",
            ]
        );

        let logs = sinks.log_lines();
        assert_eq!(logs.len(), 1);
        let event: LogEvent<'_> = serde_json::from_str(&logs[0]).unwrap();
        assert_eq!(event.level, EventLevel::Info);
        assert_eq!(&*event.msg, "handled request");
    }

    #[test]
    fn test_sampled_error_logs_once() {
        let mut sinks = TestSinks::new(1.0);

        sinks.pipeline.record(&outcome(StatusCode::INTERNAL_SERVER_ERROR));

        assert_eq!(
            sinks.statsd_lines(),
            [
                "requests:1|c|#env:dev,service:api",
                "request_duration_ms:12|ms|#env:dev,service:api",
                "errors:1|c|#env:dev,service:api",
            ]
        );
        assert_eq!(sinks.log_lines().len(), 1);
    }
}
