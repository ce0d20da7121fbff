//! Subscription access decision for one daycare.

use chrono::{DateTime, Utc};
use common::protocol::{AccessResponse, AccessState};
use serde_json::Value;

use super::DAYCARES;
use crate::db::Row;
use crate::error::ApiError;
use crate::resource;
use crate::server::state::AppState;

const STATUS_COLUMN: &str = "subscription_status";
const TRIAL_END_COLUMN: &str = "trial_ends_at";
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// `GET /api/access/{daycare_id}`; `None` when the daycare does not exist.
pub async fn check(state: &AppState, daycare_id: &str) -> Result<Option<AccessResponse>, ApiError> {
    let row = resource::get(state, DAYCARES, daycare_id).await?;
    Ok(row.map(|row| evaluate(daycare_id, &row, Utc::now())))
}

/// Interpret a daycare row's subscription columns at `now`.
///
/// A row without a `subscription_status` column predates subscriptions and is
/// grandfathered in. A row that has the column but no usable value is denied.
pub fn evaluate(daycare_id: &str, row: &Row, now: DateTime<Utc>) -> AccessResponse {
    let trial_ends_at = row
        .get(TRIAL_END_COLUMN)
        .and_then(Value::as_str)
        .map(str::to_owned);
    let decision = |state, allowed, days_remaining| AccessResponse {
        daycare_id: daycare_id.to_owned(),
        state,
        allowed,
        days_remaining,
        trial_ends_at: trial_ends_at.clone(),
    };

    let Some(status) = row.get(STATUS_COLUMN) else {
        return decision(AccessState::Grandfathered, true, None);
    };
    match status.as_str() {
        Some("active") => decision(AccessState::Active, true, None),
        Some("expired") => decision(AccessState::Expired, false, Some(0)),
        Some("trial") => match trial_ends_at.as_deref().and_then(parse_timestamp) {
            Some(end) => {
                let days = days_remaining(end, now);
                if days > 0 {
                    decision(AccessState::Trial, true, Some(days))
                } else {
                    decision(AccessState::TrialExpired, false, Some(0))
                }
            }
            None => decision(AccessState::Misconfigured, false, None),
        },
        _ => decision(AccessState::Misconfigured, false, None),
    }
}

/// Whole days left, rounded up; never negative.
fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (end - now).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms + DAY_MS - 1) / DAY_MS
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn active_is_allowed() {
        let r = evaluate("d", &row(json!({"subscription_status": "active", "trial_ends_at": null})), now());
        assert_eq!(r.state, AccessState::Active);
        assert!(r.allowed);
    }

    #[test]
    fn expired_is_denied() {
        let r = evaluate("d", &row(json!({"subscription_status": "expired"})), now());
        assert_eq!(r.state, AccessState::Expired);
        assert!(!r.allowed);
        assert_eq!(r.days_remaining, Some(0));
    }

    #[test]
    fn trial_days_round_up() {
        let end = (now() + Duration::hours(36)).to_rfc3339();
        let r = evaluate(
            "d",
            &row(json!({"subscription_status": "trial", "trial_ends_at": end})),
            now(),
        );
        assert_eq!(r.state, AccessState::Trial);
        assert!(r.allowed);
        assert_eq!(r.days_remaining, Some(2));
        assert_eq!(r.trial_ends_at.as_deref(), Some(end.as_str()));
    }

    #[test]
    fn trial_reads_postgres_timestamptz_text() {
        let r = evaluate(
            "d",
            &row(json!({"subscription_status": "trial", "trial_ends_at": "2026-10-29T12:00:00.123456+00:00"})),
            now(),
        );
        assert_eq!(r.days_remaining, Some(15));
    }

    #[test]
    fn elapsed_trial_is_denied() {
        let end = (now() - Duration::minutes(1)).to_rfc3339();
        let r = evaluate(
            "d",
            &row(json!({"subscription_status": "trial", "trial_ends_at": end})),
            now(),
        );
        assert_eq!(r.state, AccessState::TrialExpired);
        assert!(!r.allowed);
        assert_eq!(r.days_remaining, Some(0));
    }

    #[test]
    fn trial_without_end_date_is_misconfigured() {
        let r = evaluate(
            "d",
            &row(json!({"subscription_status": "trial", "trial_ends_at": null})),
            now(),
        );
        assert_eq!(r.state, AccessState::Misconfigured);
        assert!(!r.allowed);
    }

    #[test]
    fn null_or_unknown_status_is_misconfigured() {
        for status in [json!(null), json!("paused"), json!(3)] {
            let r = evaluate("d", &row(json!({"subscription_status": status})), now());
            assert_eq!(r.state, AccessState::Misconfigured);
            assert!(!r.allowed);
        }
    }

    #[test]
    fn missing_columns_are_grandfathered() {
        let r = evaluate("d", &row(json!({"id": "d", "name": "Little Oaks"})), now());
        assert_eq!(r.state, AccessState::Grandfathered);
        assert!(r.allowed);
        assert_eq!(r.days_remaining, None);
    }
}
