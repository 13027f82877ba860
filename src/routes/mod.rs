pub mod health;
pub mod itineraries;
pub mod subscriptions;
pub mod trek;
pub mod users;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::Request;
use serde_json::{json, Value};

/// Error response: status plus `{"ok": false, "error": ...}`.
pub type ApiError = (Status, Json<Value>);

pub type ApiResult = Result<Json<Value>, ApiError>;

pub fn api_error(status: Status, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "ok": false, "error": message.into() })))
}

/// Log the cause and answer with a generic 500.
pub fn internal(context: &str, cause: impl std::fmt::Display) -> ApiError {
    log::error!("[api] {}: {}", context, cause);
    api_error(Status::InternalServerError, "Server error")
}

/// Run store and provider work on the blocking pool.
pub async fn blocking<F>(f: F) -> ApiResult
where
    F: FnOnce() -> Result<Value, ApiError> + Send + 'static,
{
    match rocket::tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map(Json),
        Err(e) => Err(internal("blocking task failed", e)),
    }
}

// ── Catchers ──

#[catch(400)]
fn bad_request() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Bad request" }))
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Authentication required" }))
}

#[catch(403)]
fn forbidden() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Premium subscription required" }))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    Json(json!({ "ok": false, "error": format!("No route for {}", req.uri().path()) }))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Malformed request body" }))
}

#[catch(500)]
fn server_error() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Internal server error" }))
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![bad_request, unauthorized, forbidden, not_found, unprocessable, server_error]
}
