//! A simple liveness endpoint.

/// Always reports the service as alive.
pub async fn handle() -> &'static str {
    "ok\n"
}
