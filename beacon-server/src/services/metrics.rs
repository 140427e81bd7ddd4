//! Aggregate request metrics exposed for scraping.

use std::time::Duration;

use beacon_sampling::tuning::{HealthSample, histogram_quantile};
use prometheus::core::Metric;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use crate::constants::TUNER_QUANTILE;

/// Records request counters and the latency distribution of every handled request.
///
/// All metrics live in a registry owned by this sink, so multiple sinks in one process do not
/// interfere with each other. Recording never fails.
#[derive(Clone, Debug)]
pub struct MetricsSink {
    registry: Registry,
    requests: IntCounter,
    errors: IntCounter,
    latency: Histogram,
}

impl MetricsSink {
    /// Creates the sink and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounter::new("api_requests_total", "Total HTTP requests")?;
        let errors = IntCounter::new("api_errors_total", "Total HTTP 5xx errors")?;
        let latency = Histogram::with_opts(HistogramOpts::new(
            "api_request_duration_seconds",
            "Request duration seconds",
        ))?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            registry,
            requests,
            errors,
            latency,
        })
    }

    /// Counts a handled request.
    pub fn record_request(&self) {
        self.requests.inc();
    }

    /// Observes the latency of a handled request.
    pub fn record_latency(&self, latency: Duration) {
        self.latency.observe(latency.as_secs_f64());
    }

    /// Counts a failed request.
    pub fn record_error(&self) {
        self.errors.inc();
    }

    /// Renders all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Returns the content type of [`encode`](Self::encode).
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let metric = self.latency.metric();
        let histogram = metric.get_histogram();

        MetricsSnapshot {
            requests: self.requests.get(),
            errors: self.errors.get(),
            latency_count: histogram.get_sample_count(),
            latency_buckets: histogram
                .get_bucket()
                .iter()
                .map(|bucket| (bucket.get_upper_bound(), bucket.get_cumulative_count()))
                .collect(),
        }
    }
}

/// Cumulative values of the aggregate metrics at one point in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Total handled requests.
    pub requests: u64,
    /// Total failed requests.
    pub errors: u64,
    /// Total latency observations.
    pub latency_count: u64,
    /// Cumulative latency buckets as `(upper_bound, count)`.
    pub latency_buckets: Vec<(f64, u64)>,
}

impl MetricsSnapshot {
    /// Computes the health of the service from the requests seen since `previous`.
    ///
    /// Returns `None` if there were no requests in between.
    pub fn health_since(&self, previous: &Self) -> Option<HealthSample> {
        let requests = self.requests.saturating_sub(previous.requests);
        if requests == 0 {
            return None;
        }

        let errors = self.errors.saturating_sub(previous.errors);
        let count = self.latency_count.saturating_sub(previous.latency_count);

        let buckets: Vec<_> = self
            .latency_buckets
            .iter()
            .enumerate()
            .map(|(index, &(bound, cumulative))| {
                let before = previous.latency_buckets.get(index).map_or(0, |&(_, c)| c);
                (bound, cumulative.saturating_sub(before))
            })
            .collect();

        Some(HealthSample {
            error_ratio: errors as f64 / requests as f64,
            p90: histogram_quantile(TUNER_QUANTILE, &buckets, count).unwrap_or(0.0),
        })
    }
}
