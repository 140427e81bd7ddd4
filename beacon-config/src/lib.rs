//! Configuration for the Beacon request service.
//!
//! The configuration is loaded from an optional `config.yml` inside a config folder. Every section
//! has defaults, so an empty or missing file yields a working configuration. Values can then be
//! overridden from environment variables and command line arguments through
//! [`OverridableConfig`].

#![warn(missing_docs)]

mod config;
mod error;
mod overrides;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::overrides::*;
