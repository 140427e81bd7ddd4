//! Structured request logs streamed to a log collector.
//!
//! Every emitted [`LogEvent`] is serialized into a single JSON line and handed to a bounded queue.
//! A single writer task drains the queue into the outbound connection, which guarantees that lines
//! from concurrent requests never interleave. If the queue is full, the line is dropped and a
//! warning is logged.

use std::borrow::Cow;
use std::io;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::constants::LOG_MESSAGE;
use crate::services::pipeline::RequestOutcome;

/// Severity of a [`LogEvent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// A successfully handled request.
    Info,
    /// A request that failed with a server error.
    Error,
}

impl EventLevel {
    /// Returns `Error` for server errors and `Info` otherwise.
    pub fn from_status(status: u16) -> Self {
        if status >= 500 { Self::Error } else { Self::Info }
    }
}

/// A structured log record describing one handled request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent<'a> {
    /// Name of the service.
    #[serde(borrow)]
    pub service: Cow<'a, str>,
    /// Deployment environment.
    #[serde(borrow)]
    pub env: Cow<'a, str>,
    /// Severity derived from the status.
    pub level: EventLevel,
    /// Fixed message.
    #[serde(borrow)]
    pub msg: Cow<'a, str>,
    /// Path of the request.
    #[serde(borrow)]
    pub path: Cow<'a, str>,
    /// HTTP status of the response.
    pub status: u16,
    /// Whole milliseconds spent handling the request.
    pub latency_ms: f64,
    /// Completion time in RFC 3339 format with second precision.
    pub time: String,
}

impl<'a> LogEvent<'a> {
    /// Creates the event for a handled request.
    pub fn new(
        service: &'a str,
        env: &'a str,
        outcome: &'a RequestOutcome,
        time: DateTime<Utc>,
    ) -> Self {
        let status = outcome.status.as_u16();

        Self {
            service: Cow::Borrowed(service),
            env: Cow::Borrowed(env),
            level: EventLevel::from_status(status),
            msg: Cow::Borrowed(LOG_MESSAGE),
            path: Cow::Borrowed(&outcome.path),
            status,
            latency_ms: outcome.latency.as_millis() as f64,
            time: time.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// An error connecting to the log collector.
#[derive(Debug, thiserror::Error)]
pub enum LogsError {
    /// The connection could not be established.
    #[error("could not connect to log collector at {0}")]
    Connect(String, #[source] io::Error),

    /// The connection was not established within the connect timeout.
    #[error("timed out connecting to log collector at {0}")]
    Timeout(String),
}

/// Handle for emitting log events.
///
/// Cloning the handle is cheap. The writer task stops once all handles have been dropped and the
/// queue has been drained.
#[derive(Clone, Debug)]
pub struct LogEmitter {
    tx: mpsc::Sender<Vec<u8>>,
}

impl LogEmitter {
    /// Connects to the log collector at `addr` and spawns the writer task.
    ///
    /// Failing to connect is an error, there is no retry. Requires a running tokio runtime.
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        write_timeout: Duration,
        queue_size: usize,
    ) -> Result<(Self, JoinHandle<()>), LogsError> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| LogsError::Timeout(addr.to_owned()))?
            .map_err(|error| LogsError::Connect(addr.to_owned(), error))?;

        stream.set_nodelay(true).ok();
        beacon_log::info!("streaming request logs to {addr}");

        Ok(Self::spawn(stream, write_timeout, queue_size))
    }

    /// Spawns a writer task that writes log lines into `writer`.
    pub fn spawn<W>(writer: W, write_timeout: Duration, queue_size: usize) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let handle = tokio::spawn(write_lines(writer, rx, write_timeout));
        (Self { tx }, handle)
    }

    /// Serializes the event and queues it for writing.
    ///
    /// This never blocks. Serialization failures and a full queue drop the event with a log
    /// message.
    pub fn emit(&self, event: &LogEvent<'_>) {
        let mut line = match serde_json::to_vec(event) {
            Ok(line) => line,
            Err(error) => {
                beacon_log::error!(
                    error = &error as &dyn std::error::Error,
                    "failed to serialize log event",
                );
                return;
            }
        };
        line.push(b'\n');

        match self.tx.try_send(line) {
            Ok(()) => (),
            Err(mpsc::error::TrySendError::Full(_)) => {
                beacon_log::warn!("log queue is full, dropping log event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                beacon_log::warn!("log writer has stopped, dropping log event");
            }
        }
    }
}

#[cfg(test)]
impl LogEmitter {
    /// Creates an emitter whose lines are received from the returned channel.
    pub fn capturing(queue_size: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(queue_size);
        (Self { tx }, rx)
    }
}

/// Writes queued lines until all emitters are gone or the connection fails.
///
/// Lines are written in chunks. A timed out chunk leaves the rest of its line pending, and the line
/// is finished before the next one starts. A line is dropped only if none of it was written yet.
async fn write_lines<W>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>, write_timeout: Duration)
where
    W: AsyncWrite + Unpin,
{
    'lines: while let Some(line) = rx.recv().await {
        let mut written = 0;

        while written < line.len() {
            match tokio::time::timeout(write_timeout, writer.write(&line[written..])).await {
                Ok(Ok(0)) => {
                    beacon_log::error!("log connection closed, stopping log writer");
                    break 'lines;
                }
                Ok(Ok(n)) => written += n,
                Ok(Err(error)) => {
                    beacon_log::error!(
                        error = &error as &dyn std::error::Error,
                        "failed to write log event, stopping log writer",
                    );
                    break 'lines;
                }
                Err(_) if written == 0 => {
                    beacon_log::error!("timed out writing log event, dropping it");
                    continue 'lines;
                }
                Err(_) => {
                    beacon_log::warn!("timed out writing log event, retrying the rest of the line");
                }
            }
        }
    }

    if let Err(error) = writer.shutdown().await {
        beacon_log::debug!(
            error = &error as &dyn std::error::Error,
            "failed to close log connection",
        );
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::TimeZone;
    use tokio::io::AsyncReadExt;

    use super::*;

    fn outcome(status: StatusCode) -> RequestOutcome {
        RequestOutcome {
            path: "/checkout".to_owned(),
            status,
            latency: Duration::from_micros(42_900),
        }
    }

    fn time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_event_fields() {
        let outcome = outcome(StatusCode::INTERNAL_SERVER_ERROR);
        let event = LogEvent::new("api", "dev", &outcome, time());

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"service":"api","env":"dev","level":"error","msg":"handled request","path":"/checkout","status":500,"latency_ms":42.0,"time":"2026-10-19T12:30:05Z"}"#
        );
    }

    #[test]
    fn test_level_from_status() {
        assert_eq!(EventLevel::from_status(200), EventLevel::Info);
        assert_eq!(EventLevel::from_status(499), EventLevel::Info);
        assert_eq!(EventLevel::from_status(500), EventLevel::Error);
        assert_eq!(EventLevel::from_status(503), EventLevel::Error);
    }

    #[test]
    fn test_event_parses_back() {
        let outcome = outcome(StatusCode::OK);
        let event = LogEvent::new("api", "prod", &outcome, time());

        let json = serde_json::to_string(&event).unwrap();
        let parsed: LogEvent<'_> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.level, EventLevel::Info);
    }

    #[tokio::test]
    async fn test_writer_emits_whole_lines() {
        let (client, mut server) = tokio::io::duplex(1 << 20);
        let (emitter, handle) = LogEmitter::spawn(client, Duration::from_secs(1), 1024);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let emitter = emitter.clone();
                tokio::spawn(async move {
                    let outcome = outcome(StatusCode::OK);
                    for _ in 0..50 {
                        emitter.emit(&LogEvent::new("api", "dev", &outcome, time()));
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        drop(emitter);
        handle.await.unwrap();

        let mut output = String::new();
        server.read_to_string(&mut output).await.unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            let event: LogEvent<'_> = serde_json::from_str(line).unwrap();
            assert_eq!(&*event.path, "/checkout");
        }
    }

    #[tokio::test]
    async fn test_slow_reader_keeps_lines_whole() {
        beacon_log::init_test!();

        // Every line is larger than the pipe, so writes time out halfway through a line.
        let (client, mut server) = tokio::io::duplex(64);
        let (emitter, handle) = LogEmitter::spawn(client, Duration::from_millis(50), 16);

        let outcome = outcome(StatusCode::OK);
        emitter.emit(&LogEvent::new("api", "dev", &outcome, time()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        emitter.emit(&LogEvent::new("api", "dev", &outcome, time()));
        drop(emitter);

        let reader = tokio::spawn(async move {
            let mut output = String::new();
            server.read_to_string(&mut output).await.unwrap();
            output
        });

        handle.await.unwrap();
        let output = reader.await.unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2, "{output}");
        for line in lines {
            let event: LogEvent<'_> = serde_json::from_str(line).unwrap();
            assert_eq!(&*event.msg, "handled request");
        }
    }

    #[tokio::test]
    async fn test_broken_connection_stops_writer() {
        beacon_log::init_test!();

        let (client, server) = tokio::io::duplex(1024);
        drop(server);

        let (emitter, handle) = LogEmitter::spawn(client, Duration::from_secs(1), 16);
        let outcome = outcome(StatusCode::INTERNAL_SERVER_ERROR);
        emitter.emit(&LogEvent::new("api", "dev", &outcome, time()));

        // The writer stops although the emitter is still alive.
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        // Later events are dropped without blocking.
        emitter.emit(&LogEvent::new("api", "dev", &outcome, time()));
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (emitter, mut rx) = LogEmitter::capturing(2);
        let outcome = outcome(StatusCode::OK);

        for _ in 0..5 {
            emitter.emit(&LogEvent::new("api", "dev", &outcome, time()));
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        // Bind and drop a listener to find a local port that refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = LogEmitter::connect(
            &addr,
            Duration::from_secs(1),
            Duration::from_secs(1),
            16,
        )
        .await;
        assert!(matches!(result, Err(LogsError::Connect(..))));
    }
}
