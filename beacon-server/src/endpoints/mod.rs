//! Web server endpoints.
//!
//! This module contains implementations for all supported endpoints. Requests to paths without a
//! dedicated endpoint are handled as regular requests by the [`request`] endpoint.

use axum::Router;
use axum::routing::{get, post};
use beacon_config::Config;

use crate::service::ServiceState;

mod alerts;
mod health_check;
mod metrics;
mod request;
mod sampling;

/// Returns all routes of the service.
pub fn routes(_config: &Config) -> Router<ServiceState> {
    Router::new()
        .route("/metrics", get(metrics::handle))
        .route("/healthz", get(health_check::handle))
        .route("/control/sampling", get(sampling::handle))
        .route("/control/alerts", post(alerts::handle))
        .fallback(request::handle)
}
