use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use super::{period_bound, plan_interval, Billing, BillingError};
use crate::models::user::{SubscriptionUpdate, STATUS_FREE, STATUS_PREMIUM};
use crate::models::{from_unix, now};
use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

// ── Signature ───────────────────────────────────────────

/// Constant-time comparison for webhook signatures.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw payload. Any listed `v1` signature may match.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), BillingError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| BillingError("signature timestamp missing".into()))?;
    if signatures.is_empty() {
        return Err(BillingError("no v1 signature".into()));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(BillingError("signature timestamp outside tolerance".into()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BillingError(format!("bad webhook secret: {}", e)))?;
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures
        .iter()
        .any(|sig| constant_time_eq(sig.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(BillingError("signature mismatch".into()))
    }
}

// ── Events ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The subscription of this user was changed.
    Updated(i64),
    Ignored(&'static str),
}

/// Apply a verified Stripe event to the local subscription state.
pub fn handle_event(
    store: &dyn Store,
    billing: &dyn Billing,
    event: &Value,
) -> Result<WebhookOutcome, BillingError> {
    let kind = event["type"].as_str().unwrap_or("");
    let object = &event["data"]["object"];
    log::debug!("[billing] webhook {}", kind);

    match kind {
        "checkout.session.completed" => checkout_completed(store, billing, object),
        "customer.subscription.updated" => subscription_updated(store, object),
        "customer.subscription.deleted" => subscription_deleted(store, object),
        _ => Ok(WebhookOutcome::Ignored("unhandled event type")),
    }
}

fn checkout_completed(
    store: &dyn Store,
    billing: &dyn Billing,
    session: &Value,
) -> Result<WebhookOutcome, BillingError> {
    if session["mode"].as_str() != Some("subscription") {
        return Ok(WebhookOutcome::Ignored("Non-subscription session, ignoring"));
    }
    let user = match session["metadata"]["userId"]
        .as_str()
        .and_then(|id| id.parse::<i64>().ok())
        .and_then(|id| store.user_get_by_id(id))
    {
        Some(u) => u,
        None => return Ok(WebhookOutcome::Ignored("session has no known user")),
    };
    let subscription_id = session["subscription"]
        .as_str()
        .ok_or_else(|| BillingError("session without subscription".into()))?;

    let subscription = billing.retrieve_subscription(subscription_id)?;
    let update = SubscriptionUpdate {
        status: Some(STATUS_PREMIUM.to_string()),
        billing_interval: plan_interval(&subscription),
        start_date: period_bound(&subscription, "current_period_start").and_then(from_unix),
        end_date: period_bound(&subscription, "current_period_end").and_then(from_unix),
        stripe_subscription_id: Some(
            subscription["id"].as_str().unwrap_or(subscription_id).to_string(),
        ),
        clear_subscription_id: false,
    };
    store
        .user_update_subscription(user.id, &update)
        .map_err(BillingError)?;
    log::info!("[billing] user {} upgraded to premium", user.id);
    Ok(WebhookOutcome::Updated(user.id))
}

fn subscription_updated(store: &dyn Store, subscription: &Value) -> Result<WebhookOutcome, BillingError> {
    let user = match subscription["id"]
        .as_str()
        .and_then(|id| store.user_get_by_subscription_id(id))
    {
        Some(u) => u,
        None => return Ok(WebhookOutcome::Ignored("no user for subscription")),
    };
    let status = match subscription["status"].as_str() {
        Some("active") | Some("trialing") => STATUS_PREMIUM,
        _ => STATUS_FREE,
    };
    let update = SubscriptionUpdate {
        status: Some(status.to_string()),
        billing_interval: plan_interval(subscription),
        end_date: period_bound(subscription, "current_period_end").and_then(from_unix),
        ..Default::default()
    };
    store
        .user_update_subscription(user.id, &update)
        .map_err(BillingError)?;
    log::info!("[billing] user {} subscription now {}", user.id, status);
    Ok(WebhookOutcome::Updated(user.id))
}

fn subscription_deleted(store: &dyn Store, subscription: &Value) -> Result<WebhookOutcome, BillingError> {
    let user = match subscription["id"]
        .as_str()
        .and_then(|id| store.user_get_by_subscription_id(id))
    {
        Some(u) => u,
        None => return Ok(WebhookOutcome::Ignored("no user for subscription")),
    };
    store
        .user_update_subscription(user.id, &ended_subscription())
        .map_err(BillingError)?;
    log::info!("[billing] user {} subscription ended", user.id);
    Ok(WebhookOutcome::Updated(user.id))
}

/// Back to free, effective now, with the subscription id cleared.
pub fn ended_subscription() -> SubscriptionUpdate {
    SubscriptionUpdate {
        status: Some(STATUS_FREE.to_string()),
        end_date: Some(now()),
        clear_subscription_id: true,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, secret: &str, t: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", t, payload).as_bytes());
        format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn constant_time_eq_matches_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn valid_signature_passes() {
        let header = sign(r#"{"id":"evt_1"}"#, "whsec_test", 1_000);
        assert_eq!(verify_signature(r#"{"id":"evt_1"}"#, &header, "whsec_test", 1_100), Ok(()));
    }

    #[test]
    fn any_listed_signature_may_match() {
        let good = sign("{}", "whsec_test", 1_000);
        let header = format!("t=1000,v1=deadbeef,{}", good.split(',').nth(1).unwrap());
        assert_eq!(verify_signature("{}", &header, "whsec_test", 1_000), Ok(()));
    }

    #[test]
    fn tampered_payload_fails() {
        let header = sign(r#"{"id":"evt_1"}"#, "whsec_test", 1_000);
        assert_eq!(
            verify_signature(r#"{"id":"evt_2"}"#, &header, "whsec_test", 1_000),
            Err(BillingError("signature mismatch".into()))
        );
        assert!(verify_signature(r#"{"id":"evt_1"}"#, &header, "other", 1_000).is_err());
    }

    #[test]
    fn stale_or_malformed_header_fails() {
        let header = sign("{}", "whsec_test", 1_000);
        assert!(verify_signature("{}", &header, "whsec_test", 1_000 + 301).is_err());
        assert!(verify_signature("{}", &header, "whsec_test", 1_000 + 300).is_ok());
        assert!(verify_signature("{}", "v1=abc", "whsec_test", 1_000).is_err());
        assert!(verify_signature("{}", "t=1000", "whsec_test", 1_000).is_err());
    }

    #[test]
    fn ended_subscription_clears_id() {
        let update = ended_subscription();
        assert_eq!(update.status.as_deref(), Some(STATUS_FREE));
        assert!(update.clear_subscription_id);
        assert!(update.end_date.is_some());
    }
}
