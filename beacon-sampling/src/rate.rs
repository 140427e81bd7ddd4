use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::SamplingDecision;

/// A sample rate between `0.0` (= 0%) and `1.0` (= 100%).
///
/// Converting from `f64` clamps the value into range. `NaN` maps to `1.0` so that a broken value
/// never silences telemetry.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct SampleRate(f64);

impl SampleRate {
    /// Keep every event.
    pub const ALWAYS: Self = Self(1.0);

    /// Drop every event.
    pub const NEVER: Self = Self(0.0);

    /// Returns the rate as a plain float.
    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::ALWAYS
    }
}

impl From<f64> for SampleRate {
    fn from(value: f64) -> Self {
        // `f64::min` and `f64::max` return the non-NaN operand.
        Self(value.min(1.0).max(0.0))
    }
}

impl From<SampleRate> for f64 {
    fn from(value: SampleRate) -> Self {
        value.0
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Holds the current sample rate of the process.
///
/// The controller is shared between all request handlers and the control endpoint. Reads and
/// writes are atomic and lock-free, so callers never wait on each other. Reads may observe a
/// slightly stale value relative to a concurrent write, which is fine for best-effort sampling.
///
/// There is no global instance. Create one at startup and hand an `Arc` to whoever needs it.
pub struct SamplingController {
    /// Bit pattern of the current [`SampleRate`].
    bits: AtomicU64,
}

impl SamplingController {
    /// Creates a controller with a sample rate of `1.0`.
    pub fn new() -> Self {
        Self::with_rate(SampleRate::ALWAYS)
    }

    /// Creates a controller with the given initial sample rate.
    pub fn with_rate(rate: impl Into<SampleRate>) -> Self {
        Self {
            bits: AtomicU64::new(rate.into().get().to_bits()),
        }
    }

    /// Returns the current sample rate.
    #[inline]
    pub fn get(&self) -> f64 {
        self.rate().get()
    }

    /// Returns the current sample rate as [`SampleRate`].
    #[inline]
    pub fn rate(&self) -> SampleRate {
        // Only clamped values are ever stored, clamping again guards against foreign bit patterns.
        SampleRate::from(f64::from_bits(self.bits.load(Ordering::Relaxed)))
    }

    /// Stores a new sample rate and returns the value actually stored.
    ///
    /// Values below `0.0` are stored as `0.0`, values above `1.0` as `1.0`.
    pub fn set(&self, value: f64) -> f64 {
        let rate = SampleRate::from(value);
        self.bits.store(rate.get().to_bits(), Ordering::Relaxed);
        rate.get()
    }

    /// Makes a sampling decision based on the current sample rate.
    ///
    /// This should be called at most once per request.
    pub fn decide(&self) -> SamplingDecision {
        SamplingDecision::for_rate(self.get())
    }
}

impl Default for SamplingController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SamplingController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplingController")
            .field("rate", &self.get())
            .finish()
    }
}
