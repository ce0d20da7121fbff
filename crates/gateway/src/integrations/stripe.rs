//! `/api/stripe/{action}`: Stripe billing.
//!
//! Only the webhook is served here. It verifies the `Stripe-Signature` header
//! and moves one `daycares` row between subscription states. Checkout and
//! portal sessions are created by the billing service, not this gateway.

use axum::http::{HeaderMap, Method, StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{IntegrationError, IntegrationResponse};
use crate::db::{self, statement};
use crate::server::state::AppState;
use crate::tenant::DAYCARES;

pub const NAMESPACE: &str = "stripe";

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age, in seconds, of a signed webhook timestamp.
pub const TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {SIGNATURE_HEADER} header")]
    Missing,
    #[error("malformed {SIGNATURE_HEADER} header")]
    Malformed,
    #[error("timestamp outside the {TOLERANCE_SECS}s tolerance")]
    Expired,
    #[error("no matching v1 signature")]
    Mismatch,
}

pub async fn handle(
    state: &AppState,
    action: &str,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<IntegrationResponse, IntegrationError> {
    match action {
        "webhook" if *method == Method::POST => {
            webhook(state, headers, body, Utc::now().timestamp()).await
        }
        "webhook" => Err(IntegrationError::MethodNotAllowed),
        "create-checkout-session" | "create-portal-session" => Err(IntegrationError::NotImplemented {
            namespace: NAMESPACE,
            action: action.to_owned(),
        }),
        _ => Err(IntegrationError::UnknownAction {
            namespace: NAMESPACE,
            action: action.to_owned(),
        }),
    }
}

async fn webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    now: i64,
) -> Result<IntegrationResponse, IntegrationError> {
    let secret = state
        .stripe_webhook_secret
        .as_deref()
        .ok_or(IntegrationError::NotConfigured("Stripe"))?;
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::Missing)?;
    verify_signature(body, header, secret, now)?;

    let event: Event =
        serde_json::from_slice(body).map_err(|e| IntegrationError::Payload(e.to_string()))?;
    match subscription_change(&event) {
        Some(change) => apply(state, change).await?,
        None => debug!(event_type = %event.kind, "stripe event ignored"),
    }
    Ok(IntegrationResponse::json(StatusCode::OK, json!({"received": true})))
}

/// Verify a `t=<unix>,v1=<hex>` signature header over `payload`.
///
/// The signed message is `"{t}.{payload}"`, HMAC-SHA256 keyed with the
/// endpoint secret. Any one matching `v1` entry is accepted.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let signed_prefix = format!("{timestamp}.");
    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
        mac.update(signed_prefix.as_bytes());
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

/// Columns to set on one daycare in response to an event.
#[derive(Debug, PartialEq)]
struct SubscriptionChange {
    daycare_id: String,
    columns: Map<String, Value>,
}

fn subscription_change(event: &Event) -> Option<SubscriptionChange> {
    let object = &event.data.object;
    let status = match event.kind.as_str() {
        "checkout.session.completed" => "active",
        "customer.subscription.deleted" => "expired",
        _ => return None,
    };
    let Some(daycare_id) = object
        .pointer("/metadata/daycare_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    else {
        warn!(event_type = %event.kind, "stripe event has no metadata.daycare_id");
        return None;
    };

    let mut columns = Map::new();
    columns.insert("subscription_status".into(), status.into());
    if event.kind == "checkout.session.completed" {
        for (column, pointer) in [
            ("stripe_customer_id", "/customer"),
            ("stripe_subscription_id", "/subscription"),
            ("subscription_plan", "/metadata/plan"),
        ] {
            if let Some(value) = object.pointer(pointer).and_then(Value::as_str) {
                columns.insert(column.into(), value.into());
            }
        }
    }
    Some(SubscriptionChange {
        daycare_id: daycare_id.to_owned(),
        columns,
    })
}

async fn apply(state: &AppState, mut change: SubscriptionChange) -> Result<(), IntegrationError> {
    let registry = state.registry.load();
    let schema = registry
        .table(DAYCARES)
        .ok_or(IntegrationError::Unregistered(DAYCARES))?;
    if !schema.accepts_id(&change.daycare_id) {
        warn!(daycare_id = %change.daycare_id, "stripe event names a malformed daycare id");
        return Ok(());
    }
    // Billing columns are optional in a custom registry.
    change.columns.retain(|column, _| schema.column(column).is_some());

    let stmt = statement::update(DAYCARES, schema, &change.daycare_id, &change.columns)?;
    let pool = state.database.pool().await?;
    match db::fetch_optional_row(pool, &stmt).await? {
        Some(_) => info!(
            daycare_id = %change.daycare_id,
            subscription_status = ?change.columns.get("subscription_status"),
            "daycare subscription updated"
        ),
        None => warn!(daycare_id = %change.daycare_id, "stripe event for unknown daycare"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, RegistryCache};
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_760_000_000;

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn event(value: Value) -> Event {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn valid_signature_accepted() {
        let payload = br#"{"type":"ping"}"#;
        assert_eq!(verify_signature(payload, &sign(payload, NOW), SECRET, NOW), Ok(()));
    }

    #[test]
    fn any_matching_v1_entry_is_enough() {
        let payload = br#"{"type":"ping"}"#;
        let header = format!("{},v1=deadbeef", sign(payload, NOW)).replacen(
            "v1=",
            "v1=00ff,v1=",
            1,
        );
        assert_eq!(verify_signature(payload, &header, SECRET, NOW), Ok(()));
    }

    #[test]
    fn tampered_payload_rejected() {
        let header = sign(br#"{"amount":1}"#, NOW);
        assert_eq!(
            verify_signature(br#"{"amount":9}"#, &header, SECRET, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let payload = b"{}";
        assert_eq!(
            verify_signature(payload, &sign(payload, NOW), "whsec_other", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_rejected() {
        let payload = b"{}";
        let header = sign(payload, NOW - TOLERANCE_SECS - 1);
        assert_eq!(
            verify_signature(payload, &header, SECRET, NOW),
            Err(SignatureError::Expired)
        );
        let edge = sign(payload, NOW - TOLERANCE_SECS);
        assert_eq!(verify_signature(payload, &edge, SECRET, NOW), Ok(()));
    }

    #[test]
    fn extreme_timestamps_are_expired() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1=00");
            assert_eq!(
                verify_signature(b"{}", &header, SECRET, NOW),
                Err(SignatureError::Expired),
                "{header}"
            );
        }
    }

    #[test]
    fn malformed_headers_rejected() {
        for header in ["", "v1=abcd", "t=notanumber,v1=abcd", "t=1760000000"] {
            assert_eq!(
                verify_signature(b"{}", header, SECRET, NOW),
                Err(SignatureError::Malformed),
                "{header}"
            );
        }
    }

    #[test]
    fn checkout_completed_activates_daycare() {
        let change = subscription_change(&event(json!({
            "type": "checkout.session.completed",
            "data": {"object": {
                "customer": "cus_123",
                "subscription": "sub_456",
                "metadata": {"daycare_id": "6f1c2f9e-3f0a-4b8e-9d55-2a7f0c1e4b11", "plan": "pro"}
            }}
        })))
        .unwrap();
        assert_eq!(change.daycare_id, "6f1c2f9e-3f0a-4b8e-9d55-2a7f0c1e4b11");
        assert_eq!(change.columns["subscription_status"], "active");
        assert_eq!(change.columns["stripe_customer_id"], "cus_123");
        assert_eq!(change.columns["stripe_subscription_id"], "sub_456");
        assert_eq!(change.columns["subscription_plan"], "pro");
    }

    #[test]
    fn subscription_deleted_expires_daycare() {
        let change = subscription_change(&event(json!({
            "type": "customer.subscription.deleted",
            "data": {"object": {"customer": "cus_123", "metadata": {"daycare_id": "d1"}}}
        })))
        .unwrap();
        assert_eq!(change.columns.len(), 1);
        assert_eq!(change.columns["subscription_status"], "expired");
    }

    #[test]
    fn event_without_daycare_is_ignored() {
        let change = subscription_change(&event(json!({
            "type": "checkout.session.completed",
            "data": {"object": {"metadata": {}}}
        })));
        assert_eq!(change, None);
    }

    #[test]
    fn unrelated_event_is_ignored() {
        let change = subscription_change(&event(json!({
            "type": "invoice.paid",
            "data": {"object": {"metadata": {"daycare_id": "d1"}}}
        })));
        assert_eq!(change, None);
    }

    #[tokio::test]
    async fn webhook_without_secret_is_not_configured() {
        let state = AppState::default();
        let err = handle(&state, "webhook", &Method::POST, &HeaderMap::new(), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::NotConfigured("Stripe")));
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let state = AppState {
            stripe_webhook_secret: Some(SECRET.into()),
            ..AppState::default()
        };
        let err = handle(&state, "webhook", &Method::POST, &HeaderMap::new(), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Signature(SignatureError::Missing)));
    }

    #[tokio::test]
    async fn ignored_event_is_acknowledged_without_database() {
        let state = AppState {
            stripe_webhook_secret: Some(SECRET.into()),
            ..AppState::default()
        };
        let payload = br#"{"type":"invoice.paid","data":{"object":{}}}"#;
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign(payload, NOW)).unwrap(),
        );
        let resp = webhook(&state, &headers, payload, NOW).await.unwrap();
        assert_eq!(resp.status_code, StatusCode::OK);
        assert_eq!(resp.body, json!({"received": true}));
    }

    #[tokio::test]
    async fn malformed_daycare_id_is_acknowledged_without_database() {
        let state = AppState {
            stripe_webhook_secret: Some(SECRET.into()),
            registry: RegistryCache::with_registry(Registry::builtin().unwrap()),
            ..AppState::default()
        };
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{"metadata":{"daycare_id":"not-a-uuid"}}}}"#;
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign(payload, NOW)).unwrap(),
        );
        let resp = webhook(&state, &headers, payload, NOW).await.unwrap();
        assert_eq!(resp.status_code, StatusCode::OK);
        assert!(!state.database.is_ready());
    }

    #[tokio::test]
    async fn webhook_requires_post() {
        let state = AppState::default();
        assert!(matches!(
            handle(&state, "webhook", &Method::GET, &HeaderMap::new(), b"").await,
            Err(IntegrationError::MethodNotAllowed)
        ));
    }

    #[tokio::test]
    async fn session_actions_not_implemented() {
        let state = AppState::default();
        assert!(matches!(
            handle(&state, "create-checkout-session", &Method::POST, &HeaderMap::new(), b"{}").await,
            Err(IntegrationError::NotImplemented { .. })
        ));
    }
}
