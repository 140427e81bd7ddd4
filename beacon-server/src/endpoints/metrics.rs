use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::service::ServiceState;

/// Renders the aggregate metrics for scraping.
pub async fn handle(state: ServiceState) -> Response {
    let metrics = state.pipeline().metrics();

    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(error) => {
            beacon_log::error!(
                error = &error as &dyn std::error::Error,
                "failed to encode metrics",
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
