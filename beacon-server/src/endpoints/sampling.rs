//! Reads and updates the sample rate.

use std::borrow::Cow;

use axum::extract::RawQuery;
use axum::http::StatusCode;
use url::form_urlencoded;

use crate::service::ServiceState;

/// Returns the first `rate` parameter of a query string.
fn rate_param(query: &str) -> Option<Cow<'_, str>> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "rate")
        .map(|(_, value)| value)
}

/// Parses a rate parameter.
///
/// Values outside of `[0, 1]` are accepted and clamped later, `NaN` is rejected.
fn parse_rate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|rate| !rate.is_nan())
}

/// Returns the current rate, or stores a new one if `rate` is given.
pub async fn handle(state: ServiceState, RawQuery(query): RawQuery) -> (StatusCode, String) {
    let sampling = state.sampling();

    let param = query.as_deref().and_then(rate_param);
    let value = match param.as_deref() {
        None | Some("") => return (StatusCode::OK, format!("current_rate={}\n", sampling.get())),
        Some(value) => value,
    };

    let Some(rate) = parse_rate(value) else {
        return (StatusCode::BAD_REQUEST, "invalid rate\n".to_owned());
    };

    let applied = sampling.set(rate);
    beacon_log::info!(requested = value, rate = applied, "sample rate set");

    (StatusCode::OK, format!("ok rate={applied:.3}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("0.25"), Some(0.25));
        assert_eq!(parse_rate("2.5"), Some(2.5));
        assert_eq!(parse_rate("-1"), Some(-1.0));
        assert_eq!(parse_rate("1e-1"), Some(0.1));
        assert_eq!(parse_rate("inf"), Some(f64::INFINITY));
        assert_eq!(parse_rate("abc"), None);
        assert_eq!(parse_rate("NaN"), None);
        assert_eq!(parse_rate(""), None);
    }

    #[test]
    fn test_rate_param() {
        assert_eq!(rate_param("rate=0.5").as_deref(), Some("0.5"));
        assert_eq!(rate_param("rate=0.5&rate=0.7").as_deref(), Some("0.5"));
        assert_eq!(rate_param("debug=1&rate=%200.25").as_deref(), Some(" 0.25"));
        assert_eq!(rate_param("rate").as_deref(), Some(""));
        assert_eq!(rate_param("ratio=1"), None);
        assert_eq!(rate_param(""), None);
    }
}
