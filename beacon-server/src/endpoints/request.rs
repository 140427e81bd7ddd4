//! Handles regular requests.

use std::time::Instant;

use axum::http::{StatusCode, Uri};

use crate::service::ServiceState;
use crate::services::pipeline::RequestOutcome;

/// Processes the request and records telemetry for its outcome.
///
/// The response is `ok` for successful requests and `error` for server errors.
pub async fn handle(state: ServiceState, uri: Uri) -> (StatusCode, &'static str) {
    let start = Instant::now();
    let status = state.outcomes().process(uri.path()).await;

    let outcome = RequestOutcome {
        path: uri.path().to_owned(),
        status,
        latency: start.elapsed(),
    };
    state.pipeline().record(&outcome);

    let body = if outcome.is_error() { "error\n" } else { "ok\n" };
    (status, body)
}
