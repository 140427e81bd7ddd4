use std::fmt;

use rand::Rng;
use rand::distr::StandardUniform;

/// The result of a sampling decision for a single event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SamplingDecision {
    /// The event is forwarded to sampled sinks.
    Keep,
    /// The event is only counted in aggregate metrics.
    Drop,
}

impl SamplingDecision {
    /// Makes a decision for the given rate using the thread-local random number generator.
    ///
    /// Rates of `1.0` and above keep without drawing a random number, rates of `0.0` and below
    /// drop. Otherwise, the event is kept with probability `rate`. A rate that is not a number
    /// keeps the event.
    pub fn for_rate(rate: f64) -> Self {
        Self::for_rate_with(rate, &mut rand::rng())
    }

    /// Makes a decision for the given rate using the provided random number generator.
    pub fn for_rate_with<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> Self {
        if rate.is_nan() || rate >= 1.0 {
            return Self::Keep;
        }

        if rate <= 0.0 {
            return Self::Drop;
        }

        let draw: f64 = rng.sample(StandardUniform);
        if draw < rate { Self::Keep } else { Self::Drop }
    }

    /// Returns `true` if the event was sampled.
    #[inline]
    pub fn is_keep(self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Returns `true` if the event was not sampled.
    #[inline]
    pub fn is_drop(self) -> bool {
        !self.is_keep()
    }
}

impl From<bool> for SamplingDecision {
    fn from(value: bool) -> Self {
        if value { Self::Keep } else { Self::Drop }
    }
}

impl fmt::Display for SamplingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => f.write_str("keep"),
            Self::Drop => f.write_str("drop"),
        }
    }
}
