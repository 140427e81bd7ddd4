//! Services that make up the request handling and its telemetry.
//!
//! The [`server`] hosts the HTTP endpoints. Every handled request passes its outcome to the
//! [`pipeline`], which fans out to the aggregate [`metrics`], the push [`telemetry`] and the
//! request [`logs`]. The [`tuner`] adjusts the sample rate based on the aggregate metrics.

pub mod logs;
pub mod metrics;
pub mod outcome;
pub mod pipeline;
pub mod server;
pub mod telemetry;
pub mod tuner;
