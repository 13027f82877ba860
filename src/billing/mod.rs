pub mod stripe;
pub mod webhook;

use serde_json::{json, Value};

use crate::config::StripeConfig;

// ── Types ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BillingError(pub String);

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A subscription checkout for one price.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub user_id: i64,
    pub billing_interval: Option<String>,
    pub allow_promotion_codes: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Payment provider operations. Calls block; run them off the async executor.
/// Subscription and product objects are returned as the provider's JSON.
pub trait Billing: Send + Sync {
    /// Returns the new customer id.
    fn create_customer(&self, email: &str, name: &str, user_id: i64) -> Result<String, BillingError>;
    fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<CheckoutSession, BillingError>;
    fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value, BillingError>;
    fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Result<Value, BillingError>;
    /// Swap the price on one subscription item, prorating the difference.
    fn change_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<Value, BillingError>;
    fn cancel_subscription(&self, subscription_id: &str) -> Result<Value, BillingError>;
    fn retrieve_product(&self, product_id: &str) -> Result<Value, BillingError>;
    /// Returns the portal URL.
    fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError>;
}

// ── Subscription object helpers ───────────────────────

/// First line item of a subscription object.
pub fn first_item(subscription: &Value) -> &Value {
    &subscription["items"]["data"][0]
}

/// `month` or `year`, from the first item's plan.
pub fn plan_interval(subscription: &Value) -> Option<String> {
    first_item(subscription)["plan"]["interval"]
        .as_str()
        .map(str::to_string)
}

/// A `current_period_*` timestamp, read from the subscription or, on newer
/// API versions, from its first item.
pub fn period_bound(subscription: &Value, field: &str) -> Option<i64> {
    subscription[field]
        .as_i64()
        .or_else(|| first_item(subscription)[field].as_i64())
}

// ── Plans ─────────────────────────────────────────────

/// Public plan catalogue. Price ids come from configuration.
pub fn plans(config: &StripeConfig, free_monthly_generations: u32) -> Value {
    json!({
        "basic": {
            "name": "Basic",
            "description": "Get started with basic trekking itineraries",
            "prices": {
                "monthly": { "id": "free", "price": 0, "interval": "month", "display": "$0/month" },
                "annual": { "id": "free", "price": 0, "interval": "year", "display": "$0/year" }
            },
            "features": [
                format!("Generate up to {} itineraries per month", free_monthly_generations),
                "Advanced filters and preferences",
                "Re-generate itinerary with feedback or changes",
                "Basic conversational planning"
            ]
        },
        "pro": {
            "name": "Professional",
            "description": "Unlock unlimited itineraries and premium features",
            "prices": {
                "monthly": {
                    "id": config.pro_monthly_price,
                    "price": 9.99,
                    "interval": "month",
                    "display": "$9.99/month"
                },
                "annual": {
                    "id": config.pro_annual_price,
                    "price": 99.99,
                    "interval": "year",
                    "display": "$99.99/year",
                    "savings": "17%",
                    "saveAmount": "$19.89"
                }
            },
            "features": [
                "Unlimited itinerary generation",
                "Unlimited saved itineraries",
                "Advanced filters and preferences",
                "Re-generate itinerary with feedback or changes",
                "Advanced conversational planning",
                "Access to early features"
            ]
        }
    })
}
