use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, blocking, internal, ApiError, ApiResult};
use crate::billing::Billing;
use crate::models::user::{ProfileUpdate, User};
use crate::security::auth::{AuthenticatedUser, IdentityVerifier};
use crate::store::Store;

#[get("/profile")]
pub async fn profile(auth: AuthenticatedUser) -> Json<Value> {
    Json(json!({ "ok": true, "user": auth.user }))
}

#[put("/profile", format = "json", data = "<body>")]
pub async fn update_profile(
    auth: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    verifier: &State<Arc<dyn IdentityVerifier>>,
    body: Json<ProfileUpdate>,
) -> ApiResult {
    let store = store.inner().clone();
    let verifier = verifier.inner().clone();
    let update = body.into_inner();
    blocking(move || apply_profile(&*store, &*verifier, &auth, update)).await
}

#[get("/subscription")]
pub async fn subscription(auth: AuthenticatedUser) -> Json<Value> {
    Json(subscription_summary(&auth.user))
}

#[delete("/account")]
pub async fn delete_account(
    auth: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    verifier: &State<Arc<dyn IdentityVerifier>>,
    billing: &State<Arc<dyn Billing>>,
) -> ApiResult {
    let store = store.inner().clone();
    let verifier = verifier.inner().clone();
    let billing = billing.inner().clone();
    blocking(move || close_account(&*store, &*verifier, &*billing, &auth)).await
}

#[get("/test")]
pub async fn auth_test(auth: AuthenticatedUser) -> Json<Value> {
    Json(json!({
        "ok": true,
        "message": "Authentication successful",
        "user": {
            "userId": auth.user.id,
            "uid": auth.identity.uid,
            "email": auth.identity.email,
            "displayName": auth.identity.display_name
        }
    }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![profile, update_profile, subscription, delete_account, auth_test]
}

// ── Operations ─────────────────────────────────────────

/// Save names and preferences, mirroring a name change to the identity provider.
pub fn apply_profile(
    store: &dyn Store,
    verifier: &dyn IdentityVerifier,
    auth: &AuthenticatedUser,
    mut update: ProfileUpdate,
) -> Result<Value, ApiError> {
    if let Some(field) = update.preferences.as_ref().and_then(|p| p.invalid_field()) {
        return Err(api_error(
            Status::BadRequest,
            format!("Invalid value for {}", field),
        ));
    }
    // Blank names leave the stored value alone
    update.first_name = update
        .first_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    update.last_name = update
        .last_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let id = auth.user.id;
    store
        .user_update_profile(id, &update)
        .map_err(|e| internal("profile update", e))?;
    let user = store
        .user_get_by_id(id)
        .ok_or_else(|| api_error(Status::NotFound, "User not found"))?;

    if update.first_name.is_some() || update.last_name.is_some() {
        let display_name = user.display_name();
        if !display_name.is_empty() {
            if let Err(e) = verifier.update_display_name(&auth.token, &display_name) {
                log::warn!("[users] display name sync for user {} failed: {}", id, e);
            }
        }
    }
    Ok(json!({ "ok": true, "user": user }))
}

pub fn subscription_summary(user: &User) -> Value {
    json!({
        "ok": true,
        "status": user.subscription.status,
        "billingInterval": user.subscription.billing_interval,
        "startDate": user.subscription.start_date,
        "endDate": user.subscription.end_date
    })
}

/// Delete the local user and their itineraries, then the provider account.
pub fn close_account(
    store: &dyn Store,
    verifier: &dyn IdentityVerifier,
    billing: &dyn Billing,
    auth: &AuthenticatedUser,
) -> Result<Value, ApiError> {
    let user = &auth.user;
    if let Some(ref sub_id) = user.subscription.stripe_subscription_id {
        if let Err(e) = billing.cancel_subscription(sub_id) {
            log::warn!("[users] cancelling {} for user {} failed: {}", sub_id, user.id, e);
        }
    }

    store
        .user_delete(user.id)
        .map_err(|e| internal("account delete", e))?;
    log::info!("[users] deleted user {}", user.id);

    match verifier.delete_account(&auth.token) {
        Ok(()) => Ok(json!({ "ok": true, "message": "Account deleted successfully" })),
        Err(e) => {
            log::warn!("[users] identity delete for {} failed: {}", auth.identity.uid, e);
            Ok(json!({
                "ok": true,
                "message": "Account deleted successfully",
                "warning": "Sign-in account could not be removed"
            }))
        }
    }
}
