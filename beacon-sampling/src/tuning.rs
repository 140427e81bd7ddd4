//! Adaptive tuning of the sample rate.
//!
//! The tuner raises the sample rate in steps while the service reports a high error ratio or high
//! latency, so that more detail is available while something is wrong. Once the service is healthy
//! again, the rate decays back towards [`AutoTuneConfig::min_rate`]. Changes are separated by a
//! cooldown period to avoid flapping.
//!
//! This module contains only the policy. Collecting health samples and applying the resulting
//! rate to a [`SamplingController`](crate::SamplingController) is done by the server.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Configuration of the adaptive rate tuner.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoTuneConfig {
    /// Enables the periodic tuner.
    ///
    /// The alert webhook is always available. Defaults to `false`.
    pub enabled: bool,
    /// Interval between two health evaluations in seconds.
    pub interval: u64,
    /// Error ratio above which the rate is raised.
    pub err_high: f64,
    /// Error ratio below which the rate may decay.
    pub err_low: f64,
    /// p90 latency in seconds above which the rate is raised.
    pub lat_high: f64,
    /// p90 latency in seconds below which the rate may decay.
    pub lat_low: f64,
    /// Lower bound for tuned rates.
    pub min_rate: f64,
    /// Upper bound for tuned rates.
    pub max_rate: f64,
    /// Amount by which the rate changes per decision.
    pub step: f64,
    /// Minimum time between two changes in seconds.
    pub cooldown: u64,
}

impl AutoTuneConfig {
    /// Returns the evaluation interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    /// Returns the cooldown between two changes.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown)
    }
}

impl Default for AutoTuneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 10,
            err_high: 0.05,
            err_low: 0.01,
            lat_high: 0.35,
            lat_low: 0.20,
            min_rate: 0.1,
            max_rate: 1.0,
            step: 0.1,
            cooldown: 30,
        }
    }
}

/// Direction of a rate change.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Adjustment {
    /// Raise the rate by one step.
    Bump,
    /// Lower the rate by one step.
    Decay,
}

impl Adjustment {
    /// Returns the name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bump => "bump",
            Self::Decay => "decay",
        }
    }
}

/// Health of the service over one evaluation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthSample {
    /// Ratio of failed requests to all requests.
    pub error_ratio: f64,
    /// 90th percentile of request latency in seconds.
    pub p90: f64,
}

/// A rate change decided by the [`RateTuner`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateChange {
    /// The direction of the change.
    pub adjustment: Adjustment,
    /// The rate before the change.
    pub from: f64,
    /// The rate after the change.
    pub to: f64,
}

/// Stateful tuning policy.
///
/// The tuner remembers when it last changed the rate to enforce the cooldown. It does not own the
/// rate itself, callers pass in the current rate and apply the returned change.
#[derive(Debug)]
pub struct RateTuner {
    config: AutoTuneConfig,
    last_change: Option<Instant>,
}

impl RateTuner {
    /// Creates a tuner that may change the rate right away.
    pub fn new(config: AutoTuneConfig) -> Self {
        Self {
            config,
            last_change: None,
        }
    }

    /// Returns the configuration of this tuner.
    pub fn config(&self) -> &AutoTuneConfig {
        &self.config
    }

    /// Classifies a health sample into the adjustment it calls for, ignoring the cooldown.
    pub fn classify(&self, sample: HealthSample) -> Option<Adjustment> {
        let config = &self.config;

        if sample.error_ratio > config.err_high || sample.p90 > config.lat_high {
            Some(Adjustment::Bump)
        } else if sample.error_ratio < config.err_low && sample.p90 < config.lat_low {
            Some(Adjustment::Decay)
        } else {
            None
        }
    }

    /// Computes the rate after applying `adjustment` to `rate`.
    ///
    /// The result is bounded by `min_rate` and `max_rate` and rounded to three decimals.
    pub fn adjust(&self, rate: f64, adjustment: Adjustment) -> f64 {
        let adjusted = match adjustment {
            Adjustment::Bump => f64::min(self.config.max_rate, rate + self.config.step),
            Adjustment::Decay => f64::max(self.config.min_rate, rate - self.config.step),
        };

        (adjusted * 1000.0).round() / 1000.0
    }

    /// Returns `true` if the cooldown since the last change has elapsed at `now`.
    pub fn cooled_down(&self, now: Instant) -> bool {
        match self.last_change {
            Some(last_change) => now.saturating_duration_since(last_change) >= self.config.cooldown(),
            None => true,
        }
    }

    /// Decides on a rate change for the given adjustment.
    ///
    /// Returns `None` during the cooldown or if the bounded rate equals the current rate. A
    /// returned change resets the cooldown.
    pub fn apply(&mut self, rate: f64, adjustment: Adjustment, now: Instant) -> Option<RateChange> {
        if !self.cooled_down(now) {
            return None;
        }

        let to = self.adjust(rate, adjustment);
        if to == rate {
            return None;
        }

        self.last_change = Some(now);
        Some(RateChange {
            adjustment,
            from: rate,
            to,
        })
    }

    /// Evaluates a health sample and decides on a rate change.
    pub fn evaluate(&mut self, rate: f64, sample: HealthSample, now: Instant) -> Option<RateChange> {
        let adjustment = self.classify(sample)?;
        self.apply(rate, adjustment, now)
    }
}

/// Estimates a quantile from cumulative histogram buckets.
///
/// `buckets` contains `(upper_bound, cumulative_count)` pairs sorted by upper bound, excluding the
/// implicit `+Inf` bucket. `total` is the number of observations including those above the last
/// bound. The value is interpolated linearly within the bucket that contains the requested rank,
/// assuming a lower bound of `0` for the first bucket. Ranks that fall above the last bound
/// report the last bound.
///
/// Returns `None` if there are no observations or no buckets.
pub fn histogram_quantile(q: f64, buckets: &[(f64, u64)], total: u64) -> Option<f64> {
    if total == 0 || buckets.is_empty() {
        return None;
    }

    let rank = q.clamp(0.0, 1.0) * total as f64;

    let mut lower_bound = 0.0;
    let mut lower_count = 0u64;

    for &(upper_bound, count) in buckets {
        if count as f64 >= rank {
            let in_bucket = count.saturating_sub(lower_count);
            if in_bucket == 0 {
                return Some(upper_bound);
            }

            let fraction = (rank - lower_count as f64) / in_bucket as f64;
            return Some(lower_bound + (upper_bound - lower_bound) * fraction);
        }

        lower_bound = upper_bound;
        lower_count = count;
    }

    buckets.last().map(|&(upper_bound, _)| upper_bound)
}
