use serde_json::Value;
use std::time::Duration;

use super::{Billing, BillingError, CheckoutRequest, CheckoutSession};
use crate::config::StripeConfig;

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Stripe REST client (form-encoded requests, secret key as basic auth).
pub struct StripeClient {
    secret_key: String,
    http: reqwest::blocking::Client,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self, BillingError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BillingError(format!("HTTP client error: {}", e)))?;
        Ok(StripeClient {
            secret_key: config.secret_key.clone(),
            http,
        })
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<Value, BillingError> {
        let resp = req
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .map_err(|e| BillingError(format!("Stripe request failed: {}", e)))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .map_err(|e| BillingError(format!("Stripe JSON parse error: {}", e)))?;
        if !status.is_success() {
            let err = body["error"]["message"].as_str().unwrap_or("Stripe API error");
            return Err(BillingError(format!("Stripe returned {}: {}", status, err)));
        }
        Ok(body)
    }

    fn get(&self, path: &str) -> Result<Value, BillingError> {
        self.send(self.http.get(format!("{}/{}", STRIPE_API, path)))
    }

    fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<Value, BillingError> {
        self.send(self.http.post(format!("{}/{}", STRIPE_API, path)).form(form))
    }
}

fn required_str(body: &Value, field: &str) -> Result<String, BillingError> {
    body[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BillingError(format!("Stripe response missing {}", field)))
}

/// Form fields for a subscription checkout.
pub fn checkout_form(req: &CheckoutRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("mode", "subscription".to_string()),
        ("customer", req.customer_id.clone()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][price]", req.price_id.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("success_url", req.success_url.clone()),
        ("cancel_url", req.cancel_url.clone()),
        ("metadata[userId]", req.user_id.to_string()),
    ];
    if let Some(ref interval) = req.billing_interval {
        form.push(("metadata[billingInterval]", interval.clone()));
    }
    if req.allow_promotion_codes {
        form.push(("allow_promotion_codes", "true".to_string()));
    }
    form
}

impl Billing for StripeClient {
    fn create_customer(&self, email: &str, name: &str, user_id: i64) -> Result<String, BillingError> {
        let name = if name.trim().is_empty() { email } else { name.trim() };
        let uid = user_id.to_string();
        let body = self.post(
            "customers",
            &[("email", email), ("name", name), ("metadata[userId]", uid.as_str())],
        )?;
        required_str(&body, "id")
    }

    fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        let form = checkout_form(req);
        let pairs: Vec<(&str, &str)> = form.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let body = self.post("checkout/sessions", &pairs)?;
        Ok(CheckoutSession {
            id: required_str(&body, "id")?,
            url: required_str(&body, "url")?,
        })
    }

    fn retrieve_subscription(&self, subscription_id: &str) -> Result<Value, BillingError> {
        self.get(&format!("subscriptions/{}", subscription_id))
    }

    fn set_cancel_at_period_end(&self, subscription_id: &str, cancel: bool) -> Result<Value, BillingError> {
        self.post(
            &format!("subscriptions/{}", subscription_id),
            &[("cancel_at_period_end", if cancel { "true" } else { "false" })],
        )
    }

    fn change_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<Value, BillingError> {
        self.post(
            &format!("subscriptions/{}", subscription_id),
            &[
                ("items[0][id]", item_id),
                ("items[0][price]", price_id),
                ("proration_behavior", "create_prorations"),
            ],
        )
    }

    fn cancel_subscription(&self, subscription_id: &str) -> Result<Value, BillingError> {
        self.send(
            self.http
                .delete(format!("{}/subscriptions/{}", STRIPE_API, subscription_id)),
        )
    }

    fn retrieve_product(&self, product_id: &str) -> Result<Value, BillingError> {
        self.get(&format!("products/{}", product_id))
    }

    fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError> {
        let body = self.post(
            "billing_portal/sessions",
            &[("customer", customer_id), ("return_url", return_url)],
        )?;
        required_str(&body, "url")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_form_fields() {
        let req = CheckoutRequest {
            customer_id: "cus_1".into(),
            price_id: "price_m".into(),
            success_url: "https://x/subscription/success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "https://x/subscription/cancel".into(),
            user_id: 7,
            billing_interval: Some("monthly".into()),
            allow_promotion_codes: true,
        };
        let form = checkout_form(&req);
        let get = |k: &str| form.iter().find(|(key, _)| *key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_m"));
        assert_eq!(get("metadata[userId]"), Some("7"));
        assert_eq!(get("metadata[billingInterval]"), Some("monthly"));
        assert_eq!(get("allow_promotion_codes"), Some("true"));

        let plain = checkout_form(&CheckoutRequest {
            billing_interval: None,
            allow_promotion_codes: false,
            ..req
        });
        assert!(plain.iter().all(|(k, _)| *k != "allow_promotion_codes"));
        assert!(plain.iter().all(|(k, _)| *k != "metadata[billingInterval]"));
    }

    #[test]
    fn missing_response_field_is_an_error() {
        let body = serde_json::json!({"id": "cs_1"});
        assert_eq!(required_str(&body, "id").unwrap(), "cs_1");
        assert!(required_str(&body, "url").is_err());
    }
}
