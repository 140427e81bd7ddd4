use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::http::StatusCode;
use beacon_config::Config;
use beacon_sampling::SamplingController;
use beacon_sampling::tuning::AutoTuneConfig;
use beacon_statsd::MetricsClient;
use tokio::sync::mpsc;

use crate::service::ServiceState;
use crate::services::logs::LogEmitter;
use crate::services::metrics::MetricsSink;
use crate::services::outcome::OutcomeGenerator;
use crate::services::pipeline::TelemetryPipeline;
use crate::services::telemetry::ExternalTelemetry;
use crate::services::tuner::RateControl;

/// Capacity of the captured log queue, large enough to never drop in tests.
const LOG_QUEUE_SIZE: usize = 10_000;

/// Returns a fixed sequence of statuses without delay.
///
/// Every `every`-th request fails, starting with the `every`-th. An `every` of `0` never fails.
#[derive(Debug, Default)]
pub struct FixedOutcomes {
    every: usize,
    counter: AtomicUsize,
}

impl FixedOutcomes {
    pub fn failing_every(every: usize) -> Self {
        Self {
            every,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn ok() -> Self {
        Self::failing_every(0)
    }
}

#[async_trait]
impl OutcomeGenerator for FixedOutcomes {
    async fn process(&self, _path: &str) -> StatusCode {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        if self.every > 0 && n % self.every == 0 {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }
}

/// Receivers for everything sent to the push metrics and log sinks.
pub struct Captured {
    statsd_rx: crossbeam_channel::Receiver<Vec<u8>>,
    logs_rx: mpsc::Receiver<Vec<u8>>,
}

impl Captured {
    /// Returns all statsd packets sent since the last call.
    pub fn statsd_lines(&self) -> Vec<String> {
        self.statsd_rx
            .try_iter()
            .map(|x| String::from_utf8(x).unwrap())
            .collect()
    }

    /// Returns all log lines emitted since the last call, without trailing newline.
    pub fn log_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.logs_rx.try_recv() {
            let line = String::from_utf8(line).unwrap();
            assert!(line.ends_with('\n'), "log line without newline: {line:?}");
            lines.push(line.trim_end().to_owned());
        }
        lines
    }
}

/// A telemetry pipeline with capturing sinks and identity `api` / `dev`.
pub struct TestSinks {
    pub pipeline: TelemetryPipeline,
    pub sampling: Arc<SamplingController>,
    captured: Captured,
}

impl TestSinks {
    pub fn new(rate: f64) -> Self {
        let sampling = Arc::new(SamplingController::with_rate(rate));

        let tags = BTreeMap::from([
            ("service".to_owned(), "api".to_owned()),
            ("env".to_owned(), "dev".to_owned()),
        ]);
        let (client, statsd_rx) = MetricsClient::capturing(tags);
        let (logs, logs_rx) = LogEmitter::capturing(LOG_QUEUE_SIZE);

        let pipeline = TelemetryPipeline::new(
            sampling.clone(),
            MetricsSink::new().unwrap(),
            ExternalTelemetry::new(Arc::new(client)),
            logs,
            "api".to_owned(),
            "dev".to_owned(),
        );

        Self {
            pipeline,
            sampling,
            captured: Captured { statsd_rx, logs_rx },
        }
    }

    pub fn statsd_lines(&self) -> Vec<String> {
        self.captured.statsd_lines()
    }

    pub fn log_lines(&mut self) -> Vec<String> {
        self.captured.log_lines()
    }
}

/// Service state with capturing sinks.
pub struct TestService {
    pub state: ServiceState,
    pub captured: Captured,
}

impl TestService {
    pub fn new(rate: f64, outcomes: impl OutcomeGenerator + 'static) -> Self {
        Self::with_config(Config::default(), rate, outcomes)
    }

    pub fn with_config(config: Config, rate: f64, outcomes: impl OutcomeGenerator + 'static) -> Self {
        let TestSinks {
            pipeline,
            sampling,
            captured,
        } = TestSinks::new(rate);

        let rate_control = Arc::new(RateControl::new(sampling, AutoTuneConfig::default()));
        let state =
            ServiceState::from_parts(Arc::new(config), pipeline, Box::new(outcomes), rate_control);

        Self { state, captured }
    }

    pub fn app(&self) -> axum::Router {
        crate::services::server::make_app(self.state.clone())
    }
}
