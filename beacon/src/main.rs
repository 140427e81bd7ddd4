//! Beacon is an HTTP service that records telemetry for every request it handles.
//!
//! Aggregate metrics are always collected and can be scraped at `/metrics`. Push metrics to a
//! statsd agent and JSON request logs to a TCP log collector are sampled, with the sample rate
//! adjustable at runtime through `/control/sampling`. Server errors are always pushed and logged.
//!
//! # Workspace Crates
//!
//! Beacon is split into the following workspace crates:
//!
//!  - `beacon`: Main entry point and command line interface.
//!  - [`beacon-config`]: Static configuration for the CLI and server.
//!  - [`beacon-log`]: Logging setup and macros.
//!  - [`beacon-sampling`]: Sample rate control and adaptive tuning.
//!  - [`beacon-server`]: Endpoints and telemetry sinks.
//!  - [`beacon-statsd`]: StatsD client for push metrics.
//!
//! [`beacon-config`]: ../beacon_config/index.html
//! [`beacon-log`]: ../beacon_log/index.html
//! [`beacon-sampling`]: ../beacon_sampling/index.html
//! [`beacon-server`]: ../beacon_server/index.html
//! [`beacon-statsd`]: ../beacon_statsd/index.html

mod cli;
mod cliapp;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            beacon_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
