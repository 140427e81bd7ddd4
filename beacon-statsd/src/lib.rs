//! A high-level StatsD metric client built on cadence.
//!
//! Beacon pushes sampled request counters and timers to an external agent using the StatsD
//! protocol with DogStatsD tags. Delivery is fire-and-forget: metrics are handed to a bounded queue
//! that is drained by a background thread writing to a non-blocking UDP socket. If the queue is
//! full, the metric is dropped and a warning is logged. Sending a metric never blocks the caller.
//!
//! ## Defining Metrics
//!
//! Metric names come from types implementing [`CounterMetric`] or [`TimerMetric`]. A counter name
//! cannot be passed where a timer is expected.
//!
//! ## Creating the Client
//!
//! There is no global client. Create a [`MetricsClient`] at startup with [`MetricsClient::connect`]
//! and share it with everyone that emits metrics:
//!
//! ```no_run
//! # use std::collections::BTreeMap;
//! use beacon_statsd::{MetricsClient, MetricsConfig};
//!
//! let client = MetricsClient::connect(MetricsConfig {
//!     prefix: "api".to_owned(),
//!     host: "127.0.0.1:8125".to_owned(),
//!     default_tags: BTreeMap::new(),
//!     buffering: false,
//!     queue_size: 100_000,
//! })
//! .expect("invalid statsd address");
//! ```
//!
//! ## Macro Usage
//!
//! The recommended way to record metrics is the [`metric!`] macro, which takes the client as its
//! first argument:
//!
//! ```
//! use beacon_statsd::{metric, CounterMetric, MetricsClient};
//!
//! struct Requests;
//!
//! impl CounterMetric for Requests {
//!     fn name(&self) -> &'static str {
//!         "requests"
//!     }
//! }
//!
//! let client = MetricsClient::noop();
//! metric!(&client, counter(Requests) += 1, route = "/");
//! ```

#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::ops::Deref;

use cadence::{
    BufferedUdpMetricSink, Metric, MetricBuilder, NopMetricSink, QueuingMetricSink, StatsdClient,
    UdpMetricSink,
};

/// Default number of metrics that can be queued before new metrics are dropped.
pub const DEFAULT_QUEUE_SIZE: usize = 100_000;

/// Internal prelude for the macro
#[doc(hidden)]
pub mod _pred {
    pub use cadence::prelude::*;
}

/// The metrics prelude that is necessary to use the client.
pub mod prelude {
    pub use cadence::prelude::*;
}

/// An error creating a [`MetricsClient`].
#[derive(Debug, thiserror::Error)]
pub enum MetricsClientError {
    /// The statsd address could not be resolved.
    #[error("could not resolve statsd address {0:?}")]
    Resolve(String, #[source] io::Error),

    /// The statsd address resolved to no socket addresses.
    #[error("statsd address {0:?} did not resolve to any socket address")]
    NoAddress(String),

    /// Creating the UDP socket failed.
    #[error("could not create statsd socket")]
    Socket(#[source] io::Error),

    /// Creating the metric sink failed.
    #[error("could not create statsd sink")]
    Sink(#[from] cadence::MetricError),
}

/// Configuration for [`MetricsClient::connect`].
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Prefix which is prepended to all metric names, separated by a dot.
    pub prefix: String,
    /// Host and port of the statsd agent.
    pub host: String,
    /// Tags that are added to all metrics.
    pub default_tags: BTreeMap<String, String>,
    /// Batch metrics into larger UDP packets instead of sending each metric separately.
    pub buffering: bool,
    /// Maximum number of metrics queued for the background sender.
    pub queue_size: usize,
}

/// A statsd client with default tags, shared by all emitters of a process.
#[derive(Debug)]
pub struct MetricsClient {
    /// The raw statsd client.
    pub statsd_client: StatsdClient,
    /// Default tags to apply to every metric.
    pub default_tags: BTreeMap<String, String>,
}

impl Deref for MetricsClient {
    type Target = StatsdClient;

    fn deref(&self) -> &StatsdClient {
        &self.statsd_client
    }
}

impl MetricsClient {
    /// Creates a client from an existing statsd client.
    pub fn new(statsd_client: StatsdClient, default_tags: BTreeMap<String, String>) -> Self {
        Self {
            statsd_client,
            default_tags,
        }
    }

    /// Creates a client that discards all metrics.
    pub fn noop() -> Self {
        Self::new(StatsdClient::from_sink("", NopMetricSink), BTreeMap::new())
    }

    /// Creates a client that reports to the statsd agent configured in `config`.
    ///
    /// The address is resolved once. Metrics are sent from a background thread through a
    /// non-blocking UDP socket.
    pub fn connect(config: MetricsConfig) -> Result<Self, MetricsClientError> {
        let addr = resolve(&config.host)?;
        beacon_log::info!("reporting metrics to statsd at {addr}");

        let socket =
            UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(MetricsClientError::Socket)?;
        socket
            .set_nonblocking(true)
            .map_err(MetricsClientError::Socket)?;

        let queue_size = config.queue_size.max(1);
        let statsd_client = if config.buffering {
            let sink = BufferedUdpMetricSink::from(addr, socket)?;
            StatsdClient::from_sink(&config.prefix, QueuingMetricSink::with_capacity(sink, queue_size))
        } else {
            let sink = UdpMetricSink::from(addr, socket)?;
            StatsdClient::from_sink(&config.prefix, QueuingMetricSink::with_capacity(sink, queue_size))
        };

        Ok(Self::new(statsd_client, config.default_tags))
    }

    /// Send a metric with the default tags defined on this `MetricsClient`.
    ///
    /// Failures are logged and the metric is discarded.
    #[inline(always)]
    pub fn send_metric<'a, T>(&'a self, mut metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        for (k, v) in &self.default_tags {
            metric = metric.with_tag(k, v);
        }

        if let Err(error) = metric.try_send() {
            beacon_log::warn!(
                error = &error as &dyn std::error::Error,
                "dropped a metric for statsd",
            );
        }
    }
}

#[cfg(any(test, feature = "test"))]
impl MetricsClient {
    /// Creates a client that captures all metrics in a channel.
    ///
    /// Metrics are serialized synchronously, so they are available in the receiver as soon as the
    /// metric has been sent.
    pub fn capturing(
        default_tags: BTreeMap<String, String>,
    ) -> (Self, crossbeam_channel::Receiver<Vec<u8>>) {
        let (rx, sink) = cadence::SpyMetricSink::new();
        let client = Self::new(StatsdClient::from_sink("", sink), default_tags);
        (client, rx)
    }
}

fn resolve(host: &str) -> Result<SocketAddr, MetricsClientError> {
    host.to_socket_addrs()
        .map_err(|error| MetricsClientError::Resolve(host.to_owned(), error))?
        .next()
        .ok_or_else(|| MetricsClientError::NoAddress(host.to_owned()))
}

/// Names a timer pushed in milliseconds.
///
/// ```
/// use std::time::Instant;
///
/// use beacon_statsd::{metric, MetricsClient, TimerMetric};
///
/// struct RequestDuration;
///
/// impl TimerMetric for RequestDuration {
///     fn name(&self) -> &'static str {
///         "request_duration_ms"
///     }
/// }
///
/// let client = MetricsClient::noop();
/// let start = Instant::now();
///
/// metric!(&client, timer(RequestDuration) = start.elapsed());
/// metric!(&client, timer(RequestDuration) = start.elapsed(), route = "/checkout");
/// ```
pub trait TimerMetric {
    /// Returns the name sent to statsd, without prefix.
    fn name(&self) -> &'static str;
}

/// Names a counter.
///
/// ```
/// use beacon_statsd::{metric, CounterMetric, MetricsClient};
///
/// enum Requests {
///     Sampled,
///     Failed,
/// }
///
/// impl CounterMetric for Requests {
///     fn name(&self) -> &'static str {
///         match self {
///             Self::Sampled => "requests",
///             Self::Failed => "errors",
///         }
///     }
/// }
///
/// let client = MetricsClient::noop();
///
/// metric!(&client, counter(Requests::Sampled) += 1);
/// metric!(&client, counter(Requests::Failed) += 1, status = "500");
/// ```
pub trait CounterMetric {
    /// Returns the name sent to statsd, without prefix.
    fn name(&self) -> &'static str;
}

/// Sends a counter or timer through a [`MetricsClient`], adding tags given as `key = value`.
///
/// Counters with a value of zero are not sent. Timers take a [`Duration`](std::time::Duration)
/// and are reported in milliseconds. See [`CounterMetric`] and [`TimerMetric`] for examples.
#[macro_export]
macro_rules! metric {
    // counter(name) += value
    ($client:expr, counter($id:expr) += $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        match $value {
            value if value != 0 => {
                let client: &$crate::MetricsClient = $client;
                {
                    use $crate::_pred::*;
                    client.send_metric(
                        client.count_with_tags(&$crate::CounterMetric::name(&$id), value)
                        $(.with_tag(stringify!($($k).*), $v))*
                    )
                }
            },
            _ => {},
        };
    };

    // timer(name) = duration
    ($client:expr, timer($id:expr) = $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {{
        let client: &$crate::MetricsClient = $client;
        {
            use $crate::_pred::*;
            client.send_metric(
                client.time_with_tags(&$crate::TimerMetric::name(&$id), $value)
                    $(.with_tag(stringify!($($k).*), $v))*
            )
        }
    }};
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct TestCounter;

    impl CounterMetric for TestCounter {
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct TestTimer;

    impl TimerMetric for TestTimer {
        fn name(&self) -> &'static str {
            "timer"
        }
    }

    fn captures(rx: &crossbeam_channel::Receiver<Vec<u8>>) -> Vec<String> {
        rx.try_iter()
            .map(|x| String::from_utf8(x).unwrap())
            .collect()
    }

    #[test]
    fn test_counter_with_tags() {
        let (client, rx) = MetricsClient::capturing(BTreeMap::new());

        metric!(&client, counter(TestCounter) += 10, server = "server1");
        metric!(&client, counter(TestCounter) += 1);

        assert_eq!(
            captures(&rx),
            ["counter:10|c|#server:server1", "counter:1|c"]
        );
    }

    #[test]
    fn test_counter_zero_is_skipped() {
        let (client, rx) = MetricsClient::capturing(BTreeMap::new());
        metric!(&client, counter(TestCounter) += 0);
        assert!(captures(&rx).is_empty());
    }

    #[test]
    fn test_counter_tags_with_dots() {
        let (client, rx) = MetricsClient::capturing(BTreeMap::new());
        metric!(
            &client,
            counter(TestCounter) += 10,
            hc.route = "/",
            server = "server1",
        );
        assert_eq!(captures(&rx), ["counter:10|c|#hc.route:/,server:server1"]);
    }

    #[test]
    fn test_timer_in_milliseconds() {
        let (client, rx) = MetricsClient::capturing(BTreeMap::new());
        metric!(&client, timer(TestTimer) = Duration::from_millis(42));
        assert_eq!(captures(&rx), ["timer:42|ms"]);
    }

    #[test]
    fn test_default_tags_are_sorted_and_appended() {
        let default_tags = BTreeMap::from([
            ("service".to_owned(), "api".to_owned()),
            ("env".to_owned(), "dev".to_owned()),
        ]);
        let (client, rx) = MetricsClient::capturing(default_tags);

        metric!(&client, counter(TestCounter) += 1, route = "/");
        metric!(&client, timer(TestTimer) = Duration::from_secs(1));

        assert_eq!(
            captures(&rx),
            [
                "counter:1|c|#route:/,env:dev,service:api",
                "timer:1000|ms|#env:dev,service:api"
            ]
        );
    }

    #[test]
    fn test_resolve_invalid_address() {
        let error = resolve("not an address").unwrap_err();
        assert!(matches!(error, MetricsClientError::Resolve(..)));
    }

    #[test]
    fn test_connect_localhost() {
        let client = MetricsClient::connect(MetricsConfig {
            prefix: "api".to_owned(),
            host: "127.0.0.1:8125".to_owned(),
            default_tags: BTreeMap::new(),
            buffering: false,
            queue_size: DEFAULT_QUEUE_SIZE,
        })
        .unwrap();

        // Nothing listens on the port, which must not fail or block the caller.
        metric!(&client, counter(TestCounter) += 1);
    }
}
