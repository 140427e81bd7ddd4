//! Logging facade for Beacon.
//!
//! # Setup
//!
//! With the `init` feature, invoke the `init` function with a `LogConfig` to enable logging. The
//! configuration implements `serde` traits, so it can be obtained from configuration files.
//!
//! ```ignore
//! let log_config = beacon_log::LogConfig {
//!     enable_backtraces: true,
//!     ..Default::default()
//! };
//!
//! beacon_log::init(&log_config);
//! ```
//!
//! # Logging
//!
//! The basic use of this crate is through the five logging macros: [`error!`], [`warn!`],
//! [`info!`], [`debug!`] and [`trace!`] where `error!` represents the highest-priority log messages
//! and `trace!` the lowest. They are re-exported from `tracing` and accept structured fields.
//!
//! ## Conventions
//!
//! Log messages should start lowercase and end without punctuation. Prefer short and precise log
//! messages over verbose text. Choose the log level according to these rules:
//!
//! - [`error!`] for bugs and invalid behavior.
//! - [`warn!`] for undesirable behavior, such as dropped telemetry.
//! - [`info!`] for messages relevant to the average user.
//! - [`debug!`] for messages usually relevant to debugging.
//! - [`trace!`] for full auxiliary information.
//!
//! ```
//! beacon_log::info!("startup complete");
//!
//! let error = std::io::Error::other("connection reset");
//! beacon_log::warn!(error = &error as &dyn std::error::Error, "failed to write log record");
//! ```
//!
//! # Testing
//!
//! For unit testing, the `test` feature provides a separate initialization macro `init_test!` that
//! should be called at the beginning of the test method. It enables test mode of the logger and
//! customizes log levels for the current crate.
//!
//! ```ignore
//! #[test]
//! fn test_something() {
//!     beacon_log::init_test!();
//! }
//! ```

#![warn(missing_docs)]

#[cfg(feature = "init")]
mod setup;
#[cfg(feature = "init")]
pub use setup::*;

#[cfg(feature = "test")]
mod test;
#[cfg(feature = "test")]
pub use test::*;

mod utils;
pub use utils::*;

// Expose the minimal log facade.
#[doc(inline)]
pub use tracing::{Level, debug, error, info, trace, warn};
