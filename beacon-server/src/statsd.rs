use beacon_statsd::{CounterMetric, TimerMetric};

/// Counter metrics pushed to the statsd agent.
pub enum ServiceCounters {
    /// Number of sampled requests.
    ///
    /// Only incremented when the request was sampled. Together with the sample rate, this can be
    /// used to estimate total traffic.
    Requests,
    /// Number of requests that failed with a server error.
    ///
    /// Incremented for every failed request, regardless of sampling.
    Errors,
}

impl CounterMetric for ServiceCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::Requests => "requests",
            Self::Errors => "errors",
        }
    }
}

/// Timer metrics pushed to the statsd agent.
pub enum ServiceTimers {
    /// Time spent handling a sampled request, in milliseconds.
    RequestDuration,
}

impl TimerMetric for ServiceTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::RequestDuration => "request_duration_ms",
        }
    }
}
