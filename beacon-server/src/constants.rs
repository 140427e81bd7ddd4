/// Value of the `Server` response header.
pub const SERVER: &str = concat!("beacon/", env!("CARGO_PKG_VERSION"));

/// Message of every log event emitted for a handled request.
pub const LOG_MESSAGE: &str = "handled request";

/// Quantile of the request latency observed by the rate tuner.
pub const TUNER_QUANTILE: f64 = 0.9;
