//! Adjusts the sample rate based on service health and alerts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use beacon_sampling::SamplingController;
use beacon_sampling::tuning::{Adjustment, AutoTuneConfig, HealthSample, RateChange, RateTuner};
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;

use crate::services::metrics::{MetricsSink, MetricsSnapshot};

/// Shared control over the sample rate.
///
/// Both the periodic [`AutoTuner`] and the alert webhook change the rate through this type, so
/// they share one cooldown.
#[derive(Debug)]
pub struct RateControl {
    sampling: Arc<SamplingController>,
    tuner: Mutex<RateTuner>,
}

impl RateControl {
    /// Creates a rate control for the given controller.
    pub fn new(sampling: Arc<SamplingController>, config: AutoTuneConfig) -> Self {
        Self {
            sampling,
            tuner: Mutex::new(RateTuner::new(config)),
        }
    }

    /// Returns the controlled sample rate.
    pub fn sampling(&self) -> &SamplingController {
        &self.sampling
    }

    /// Raises or lowers the rate by one step unless the cooldown is active.
    pub fn adjust(&self, adjustment: Adjustment, source: &'static str) -> Option<RateChange> {
        let mut tuner = self.tuner.lock();
        let change = tuner.apply(self.sampling.get(), adjustment, Instant::now())?;
        self.commit(change, source);
        Some(change)
    }

    /// Evaluates a health sample and applies the resulting change, if any.
    pub fn evaluate(&self, sample: HealthSample, source: &'static str) -> Option<RateChange> {
        let mut tuner = self.tuner.lock();
        let change = tuner.evaluate(self.sampling.get(), sample, Instant::now())?;
        self.commit(change, source);
        Some(change)
    }

    fn commit(&self, change: RateChange, source: &'static str) {
        let applied = self.sampling.set(change.to);
        beacon_log::info!(
            action = change.adjustment.as_str(),
            source,
            from_rate = change.from,
            to_rate = applied,
            "changed sample rate",
        );
    }
}

/// Periodically evaluates aggregate metrics and adjusts the sample rate.
#[derive(Debug)]
pub struct AutoTuner {
    control: Arc<RateControl>,
    metrics: MetricsSink,
    previous: MetricsSnapshot,
}

impl AutoTuner {
    /// Creates a tuner that evaluates requests recorded from now on.
    pub fn new(control: Arc<RateControl>, metrics: MetricsSink) -> Self {
        let previous = metrics.snapshot();
        Self {
            control,
            metrics,
            previous,
        }
    }

    /// Evaluates the requests since the last tick.
    pub fn tick(&mut self) -> Option<RateChange> {
        let current = self.metrics.snapshot();
        let sample = current.health_since(&self.previous);
        self.previous = current;

        let Some(sample) = sample else {
            beacon_log::debug!("no requests since last evaluation");
            return None;
        };

        beacon_log::info!(
            error_ratio = sample.error_ratio,
            p90 = sample.p90,
            rate = self.control.sampling().get(),
            "evaluated service health",
        );

        self.control.evaluate(sample, "tuner")
    }

    /// Runs the tuner forever, ticking every `interval`.
    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.tick();
        }
    }
}
