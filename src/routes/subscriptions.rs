use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, blocking, ApiError, ApiResult};
use crate::billing::webhook::{self, WebhookOutcome};
use crate::billing::{self, first_item, period_bound, Billing, CheckoutRequest};
use crate::config::Config;
use crate::models::from_unix;
use crate::models::user::User;
use crate::security::auth::{AuthenticatedUser, PremiumUser};
use crate::store::Store;

// ── Request guards ─────────────────────────────────────

/// The raw `Stripe-Signature` header; requests without one are rejected.
pub struct StripeSignature(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StripeSignature {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.headers().get_one("Stripe-Signature") {
            Some(sig) if !sig.trim().is_empty() => Outcome::Success(StripeSignature(sig.to_string())),
            _ => Outcome::Error((Status::BadRequest, ())),
        }
    }
}

/// The `Origin` header, if any.
pub struct RequestOrigin(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestOrigin {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(RequestOrigin(
            request.headers().get_one("Origin").map(str::to_string),
        ))
    }
}

/// Base URL for checkout redirects: the caller's origin when it is one of
/// ours, the site URL otherwise.
pub fn redirect_base(origin: Option<&str>, config: &Config) -> String {
    match origin {
        Some(o) if config.allowed_origins.iter().any(|a| a == o) => o.to_string(),
        _ => config.site_url.trim_end_matches('/').to_string(),
    }
}

fn billing_failed(message: &str, cause: impl std::fmt::Display) -> ApiError {
    log::error!("[subscriptions] {}: {}", message, cause);
    api_error(Status::InternalServerError, message)
}

fn no_subscription(user: &User) -> Result<&str, ApiError> {
    user.subscription
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| api_error(Status::BadRequest, "No active subscription found"))
}

// ── Handlers ───────────────────────────────────────────

#[get("/plans")]
pub fn plans(config: &State<Arc<Config>>) -> Json<Value> {
    Json(billing::plans(&config.stripe, config.free_monthly_generations))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub price_id: String,
    #[serde(default = "default_interval")]
    pub billing_interval: String,
}

fn default_interval() -> String {
    "monthly".to_string()
}

#[post("/create-checkout-session", format = "json", data = "<body>")]
pub async fn create_checkout_session(
    auth: AuthenticatedUser,
    origin: RequestOrigin,
    store: &State<Arc<dyn Store>>,
    billing: &State<Arc<dyn Billing>>,
    config: &State<Arc<Config>>,
    body: Json<CheckoutBody>,
) -> ApiResult {
    let store = store.inner().clone();
    let billing = billing.inner().clone();
    let base = redirect_base(origin.0.as_deref(), config);
    let body = body.into_inner();
    blocking(move || {
        start_checkout(
            &*store,
            &*billing,
            &auth.user,
            &body.price_id,
            Some(body.billing_interval),
            &base,
        )
    })
    .await
}

#[post("/webhook", data = "<payload>")]
pub async fn stripe_webhook(
    signature: StripeSignature,
    store: &State<Arc<dyn Store>>,
    billing: &State<Arc<dyn Billing>>,
    config: &State<Arc<Config>>,
    payload: Data<'_>,
) -> ApiResult {
    let payload = match payload.open(1.mebibytes()).into_string().await {
        Ok(s) if s.is_complete() => s.into_inner(),
        Ok(_) => return Err(api_error(Status::PayloadTooLarge, "Webhook payload too large")),
        Err(e) => return Err(api_error(Status::BadRequest, format!("Webhook Error: {}", e))),
    };
    let store = store.inner().clone();
    let billing = billing.inner().clone();
    let secret = config.stripe.webhook_secret.clone();
    blocking(move || {
        receive_webhook(
            &*store,
            &*billing,
            &payload,
            &signature.0,
            &secret,
            chrono::Utc::now().timestamp(),
        )
    })
    .await
}

#[get("/current")]
pub async fn current(auth: AuthenticatedUser, billing: &State<Arc<dyn Billing>>) -> ApiResult {
    let billing = billing.inner().clone();
    blocking(move || Ok(subscription_details(&*billing, &auth.user))).await
}

#[post("/cancel")]
pub async fn cancel(premium: PremiumUser, billing: &State<Arc<dyn Billing>>) -> ApiResult {
    let billing = billing.inner().clone();
    blocking(move || cancel_at_period_end(&*billing, &premium.0.user)).await
}

#[post("/reactivate")]
pub async fn reactivate(premium: PremiumUser, billing: &State<Arc<dyn Billing>>) -> ApiResult {
    let billing = billing.inner().clone();
    blocking(move || resume(&*billing, &premium.0.user)).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanBody {
    #[serde(default)]
    pub new_price_id: String,
}

#[post("/change-plan", format = "json", data = "<body>")]
pub async fn change_plan(
    auth: AuthenticatedUser,
    origin: RequestOrigin,
    store: &State<Arc<dyn Store>>,
    billing: &State<Arc<dyn Billing>>,
    config: &State<Arc<Config>>,
    body: Json<ChangePlanBody>,
) -> ApiResult {
    let store = store.inner().clone();
    let billing = billing.inner().clone();
    let base = redirect_base(origin.0.as_deref(), config);
    let price = body.into_inner().new_price_id;
    blocking(move || switch_plan(&*store, &*billing, &auth.user, &price, &base)).await
}

#[post("/cancel-immediately")]
pub async fn cancel_immediately(
    premium: PremiumUser,
    store: &State<Arc<dyn Store>>,
    billing: &State<Arc<dyn Billing>>,
) -> ApiResult {
    let store = store.inner().clone();
    let billing = billing.inner().clone();
    blocking(move || end_now(&*store, &*billing, &premium.0.user)).await
}

#[derive(FromForm)]
pub struct PortalQuery {
    #[field(name = "returnUrl")]
    pub return_url: Option<String>,
}

#[get("/customer-portal?<query..>")]
pub async fn customer_portal(
    auth: AuthenticatedUser,
    billing: &State<Arc<dyn Billing>>,
    config: &State<Arc<Config>>,
    query: PortalQuery,
) -> ApiResult {
    let billing = billing.inner().clone();
    let return_url = query
        .return_url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| format!("{}/account", config.site_url.trim_end_matches('/')));
    blocking(move || portal(&*billing, &auth.user, &return_url)).await
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        plans,
        create_checkout_session,
        stripe_webhook,
        current,
        cancel,
        reactivate,
        change_plan,
        cancel_immediately,
        customer_portal
    ]
}

// ── Operations ─────────────────────────────────────────

/// The user's Stripe customer id, creating the customer on first use.
pub fn ensure_customer(store: &dyn Store, billing: &dyn Billing, user: &User) -> Result<String, ApiError> {
    if let Some(ref id) = user.subscription.stripe_customer_id {
        return Ok(id.clone());
    }
    let name = user.display_name();
    let id = billing
        .create_customer(&user.email, &name, user.id)
        .map_err(|e| billing_failed("Failed to create checkout session", e))?;
    store
        .user_set_stripe_customer(user.id, &id)
        .map_err(|e| billing_failed("Failed to create checkout session", e))?;
    log::info!("[subscriptions] created customer {} for user {}", id, user.id);
    Ok(id)
}

pub fn start_checkout(
    store: &dyn Store,
    billing: &dyn Billing,
    user: &User,
    price_id: &str,
    billing_interval: Option<String>,
    base: &str,
) -> Result<Value, ApiError> {
    let price_id = price_id.trim();
    if price_id.is_empty() || price_id == "free" {
        return Err(api_error(Status::BadRequest, "Price ID is required"));
    }
    let customer_id = ensure_customer(store, billing, user)?;
    let session = billing
        .create_checkout_session(&CheckoutRequest {
            customer_id,
            price_id: price_id.to_string(),
            success_url: format!("{}/subscription/success?session_id={{CHECKOUT_SESSION_ID}}", base),
            cancel_url: format!("{}/subscription/cancel", base),
            user_id: user.id,
            allow_promotion_codes: billing_interval.is_some(),
            billing_interval,
        })
        .map_err(|e| billing_failed("Failed to create checkout session", e))?;
    Ok(json!({ "ok": true, "sessionId": session.id, "url": session.url }))
}

/// Verify, parse and apply one webhook delivery.
pub fn receive_webhook(
    store: &dyn Store,
    billing: &dyn Billing,
    payload: &str,
    signature: &str,
    secret: &str,
    now: i64,
) -> Result<Value, ApiError> {
    webhook::verify_signature(payload, signature, secret, now).map_err(|e| {
        log::warn!("[subscriptions] webhook rejected: {}", e);
        api_error(Status::BadRequest, format!("Webhook Error: {}", e))
    })?;
    let event: Value = serde_json::from_str(payload)
        .map_err(|e| api_error(Status::BadRequest, format!("Webhook Error: {}", e)))?;

    match webhook::handle_event(store, billing, &event) {
        Ok(WebhookOutcome::Updated(_)) => Ok(json!({ "received": true })),
        Ok(WebhookOutcome::Ignored(why)) => Ok(json!({ "received": true, "message": why })),
        Err(e) => Err(billing_failed("Failed to process webhook", e)),
    }
}

/// Stored subscription state, enriched from Stripe when a subscription exists.
pub fn subscription_details(billing: &dyn Billing, user: &User) -> Value {
    let sub = &user.subscription;
    let interval = if sub.billing_interval.is_empty() {
        "month"
    } else {
        sub.billing_interval.as_str()
    };
    let mut details = json!({
        "ok": true,
        "status": sub.status,
        "billingInterval": interval,
        "formattedInterval": if interval == "year" { "annually" } else { "monthly" },
        "startDate": sub.start_date,
        "endDate": sub.end_date,
        "isActive": user.is_premium()
    });

    let sub_id = match sub.stripe_subscription_id {
        Some(ref id) => id,
        None => return details,
    };
    let remote = match billing.retrieve_subscription(sub_id) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("[subscriptions] fetching {} failed: {}", sub_id, e);
            return details;
        }
    };

    let plan = &first_item(&remote)["plan"];
    let period_end = period_bound(&remote, "current_period_end").and_then(from_unix);
    let mut name = String::from(if plan["product"].is_string() { "Pro" } else { "Basic" });
    if let Some(product_id) = plan["product"].as_str() {
        match billing.retrieve_product(product_id) {
            Ok(product) => {
                if let Some(n) = product["name"].as_str() {
                    name = n.to_string();
                }
            }
            Err(e) => log::warn!("[subscriptions] fetching product {} failed: {}", product_id, e),
        }
    }
    let amount = plan["amount"]
        .as_i64()
        .map(|cents| format!("{:.2}", cents as f64 / 100.0))
        .unwrap_or_else(|| "0".to_string());
    let currency = plan["currency"]
        .as_str()
        .map(str::to_uppercase)
        .unwrap_or_else(|| "USD".to_string());

    details["currentPeriodEnd"] = json!(period_end);
    details["nextInvoice"] = json!(period_end);
    details["cancelAtPeriodEnd"] = json!(remote["cancel_at_period_end"].as_bool().unwrap_or(false));
    details["plan"] = json!({ "name": name, "amount": amount, "currency": currency });
    details
}

pub fn cancel_at_period_end(billing: &dyn Billing, user: &User) -> Result<Value, ApiError> {
    let sub_id = no_subscription(user)?;
    billing
        .set_cancel_at_period_end(sub_id, true)
        .map_err(|e| billing_failed("Failed to cancel subscription", e))?;
    log::info!("[subscriptions] user {} cancels at period end", user.id);
    Ok(json!({
        "ok": true,
        "message": "Subscription will be canceled at the end of the billing period",
        "endDate": user.subscription.end_date
    }))
}

pub fn resume(billing: &dyn Billing, user: &User) -> Result<Value, ApiError> {
    let sub_id = user
        .subscription
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| api_error(Status::BadRequest, "No subscription found"))?;
    let remote = billing
        .retrieve_subscription(sub_id)
        .map_err(|e| billing_failed("Failed to reactivate subscription", e))?;
    if !remote["cancel_at_period_end"].as_bool().unwrap_or(false) {
        return Err(api_error(Status::BadRequest, "Subscription is not set to cancel"));
    }
    billing
        .set_cancel_at_period_end(sub_id, false)
        .map_err(|e| billing_failed("Failed to reactivate subscription", e))?;
    Ok(json!({ "ok": true, "message": "Subscription reactivated successfully" }))
}

/// Move to another price, or start a checkout when there is no subscription yet.
pub fn switch_plan(
    store: &dyn Store,
    billing: &dyn Billing,
    user: &User,
    new_price_id: &str,
    base: &str,
) -> Result<Value, ApiError> {
    let new_price_id = new_price_id.trim();
    if new_price_id.is_empty() {
        return Err(api_error(Status::BadRequest, "New price ID is required"));
    }
    let sub_id = match user.subscription.stripe_subscription_id {
        Some(ref id) => id,
        None => return start_checkout(store, billing, user, new_price_id, None, base),
    };
    let remote = billing
        .retrieve_subscription(sub_id)
        .map_err(|e| billing_failed("Failed to change subscription plan", e))?;
    let item_id = first_item(&remote)["id"]
        .as_str()
        .ok_or_else(|| billing_failed("Failed to change subscription plan", "subscription has no items"))?;
    billing
        .change_price(sub_id, item_id, new_price_id)
        .map_err(|e| billing_failed("Failed to change subscription plan", e))?;
    log::info!("[subscriptions] user {} switched to {}", user.id, new_price_id);
    Ok(json!({ "ok": true, "message": "Subscription updated successfully" }))
}

pub fn end_now(store: &dyn Store, billing: &dyn Billing, user: &User) -> Result<Value, ApiError> {
    let sub_id = no_subscription(user)?;
    billing
        .cancel_subscription(sub_id)
        .map_err(|e| billing_failed("Failed to cancel subscription", e))?;
    store
        .user_update_subscription(user.id, &webhook::ended_subscription())
        .map_err(|e| billing_failed("Failed to cancel subscription", e))?;
    log::info!("[subscriptions] user {} cancelled immediately", user.id);
    Ok(json!({ "ok": true, "message": "Subscription has been canceled immediately" }))
}

pub fn portal(billing: &dyn Billing, user: &User, return_url: &str) -> Result<Value, ApiError> {
    let customer_id = user
        .subscription
        .stripe_customer_id
        .as_deref()
        .ok_or_else(|| api_error(Status::BadRequest, "No Stripe customer found"))?;
    let url = billing
        .create_portal_session(customer_id, return_url)
        .map_err(|e| billing_failed("Failed to create customer portal session", e))?;
    Ok(json!({ "ok": true, "url": url }))
}
