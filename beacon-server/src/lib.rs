//! The Beacon request service.
//!
//! Beacon handles HTTP requests and records telemetry for every one of them:
//!
//!  - Aggregate counters and a latency histogram are always recorded and exposed at `/metrics`.
//!  - Push metrics are sent to a statsd agent for sampled requests. Errors are always pushed.
//!  - A JSON log line is streamed to a log collector over TCP for sampled requests and for every
//!    error.
//!
//! The sample rate starts at `1.0` and can be read and changed at runtime through
//! `/control/sampling`. Alert notifications posted to `/control/alerts` and an optional periodic
//! tuner step the rate up while the service is unhealthy and back down once it recovers.
//!
//! # Startup
//!
//! [`run`] connects all sinks before binding the HTTP port. Failing to resolve the statsd address or
//! to connect to the log collector aborts the startup with an error. Once running, failures in the
//! telemetry sinks are logged and never affect responses.

#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::Context;
use beacon_config::Config;

mod constants;
mod endpoints;
mod middlewares;
mod service;
pub mod services;
mod statsd;

#[cfg(test)]
mod testutils;

pub use self::service::*;
pub use self::services::server::{HttpServer, ServerError};

/// Runs the service until a shutdown signal is received.
///
/// This creates a multi-threaded tokio runtime and blocks the current thread.
pub fn run(config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("beacon-worker")
        .enable_all()
        .build()
        .context("could not create runtime")?;

    runtime.block_on(serve(Arc::new(config)))
}

async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    let (state, tasks) = ServiceState::start(config.clone()).await?;
    let server = HttpServer::new(&config, state)?;

    server
        .run(
            config.shutdown_timeout(),
            services::server::shutdown_signal(),
        )
        .await
        .context("http server failed")?;

    if let Some(tuner) = tasks.tuner {
        tuner.abort();
    }

    // The writer stops once the last log emitter is gone. Give it a chance to flush.
    match tokio::time::timeout(config.shutdown_timeout(), tasks.log_writer).await {
        Ok(Ok(())) => beacon_log::info!("flushed request logs"),
        Ok(Err(error)) => beacon_log::error!(
            error = &error as &dyn std::error::Error,
            "log writer failed",
        ),
        Err(_) => beacon_log::warn!("timed out flushing request logs"),
    }

    Ok(())
}
