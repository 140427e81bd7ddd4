//! Webhook for alert notifications that drive the sample rate.

use axum::body::Bytes;
use beacon_sampling::tuning::Adjustment;
use serde::Deserialize;

use crate::service::ServiceState;

#[derive(Debug, Default, Deserialize)]
struct AlertPayload {
    #[serde(default)]
    alerts: Vec<Alert>,
}

#[derive(Debug, Deserialize)]
struct Alert {
    #[serde(default)]
    status: Option<String>,
}

impl AlertPayload {
    /// Raises the rate while any alert fires, lowers it once all alerts are resolved.
    fn adjustment(&self) -> Option<Adjustment> {
        let has_status = |alert: &Alert, status: &str| alert.status.as_deref() == Some(status);

        if self.alerts.iter().any(|alert| has_status(alert, "firing")) {
            Some(Adjustment::Bump)
        } else if !self.alerts.is_empty()
            && self.alerts.iter().all(|alert| has_status(alert, "resolved"))
        {
            Some(Adjustment::Decay)
        } else {
            None
        }
    }
}

/// Handles an alert notification.
///
/// Payloads that cannot be parsed are treated as containing no alerts.
pub async fn handle(state: ServiceState, body: Bytes) -> &'static str {
    let payload: AlertPayload = serde_json::from_slice(&body).unwrap_or_default();
    beacon_log::info!(alerts = payload.alerts.len(), "received alert notification");

    if let Some(adjustment) = payload.adjustment() {
        state.rate_control().adjust(adjustment, "alert");
    }

    "ok\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(json: &str) -> Option<Adjustment> {
        serde_json::from_str::<AlertPayload>(json)
            .unwrap_or_default()
            .adjustment()
    }

    #[test]
    fn test_any_firing_bumps() {
        assert_eq!(
            adjustment(r#"{"alerts": [{"status": "resolved"}, {"status": "firing"}]}"#),
            Some(Adjustment::Bump)
        );
    }

    #[test]
    fn test_all_resolved_decays() {
        assert_eq!(
            adjustment(r#"{"alerts": [{"status": "resolved"}, {"status": "resolved"}]}"#),
            Some(Adjustment::Decay)
        );
    }

    #[test]
    fn test_no_change() {
        assert_eq!(adjustment(r#"{"alerts": []}"#), None);
        assert_eq!(adjustment(r#"{"alerts": [{"status": "pending"}]}"#), None);
        assert_eq!(adjustment(r#"{"alerts": [{"labels": {}}]}"#), None);
        assert_eq!(adjustment("not json"), None);
        assert_eq!(adjustment("{}"), None);
    }
}
