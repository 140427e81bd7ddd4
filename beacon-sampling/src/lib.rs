//! Sampling functionality for Beacon's telemetry pipeline.
//!
//! Every request handled by Beacon records aggregate metrics unconditionally. Forwarding the
//! request to the external telemetry agent and writing a structured log line is subject to a
//! process-wide sample rate, which is held by a [`SamplingController`].
//!
//! # Sample Rate
//!
//! The sample rate is a probability in `[0.0, 1.0]`. A rate of `1.0` keeps every event, a rate of
//! `0.0` drops every event. Values outside of this range are clamped when they are stored, so the
//! controller never rejects a value:
//!
//! ```
//! use beacon_sampling::SamplingController;
//!
//! let controller = SamplingController::new();
//! assert_eq!(controller.get(), 1.0);
//!
//! assert_eq!(controller.set(2.5), 1.0);
//! assert_eq!(controller.set(-0.5), 0.0);
//! assert_eq!(controller.set(0.25), 0.25);
//! ```
//!
//! # Sampling Decisions
//!
//! A [`SamplingDecision`] is made at most once per request. It is a Bernoulli trial with the
//! current sample rate as probability of success:
//!
//! ```
//! use beacon_sampling::{SamplingController, SamplingDecision};
//!
//! let controller = SamplingController::new();
//! controller.set(0.0);
//! assert_eq!(controller.decide(), SamplingDecision::Drop);
//! ```
//!
//! # Adaptive Tuning
//!
//! The [`tuning`] module contains the policy that raises the sample rate while the service looks
//! unhealthy and decays it while it is healthy.

#![warn(missing_docs)]

mod decision;
mod rate;
pub mod tuning;

pub use self::decision::*;
pub use self::rate::*;
