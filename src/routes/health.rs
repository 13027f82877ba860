use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::now;
use crate::store::Store;

#[get("/")]
pub fn banner() -> &'static str {
    "TrekAI server is running"
}

#[get("/health")]
pub async fn health(store: &State<Arc<dyn Store>>) -> (Status, Json<Value>) {
    let store = store.inner().clone();
    let probe = Arc::clone(&store);
    let result = rocket::tokio::task::spawn_blocking(move || probe.ping())
        .await
        .unwrap_or_else(|e| Err(e.to_string()));
    health_report(store.backend(), result)
}

pub fn health_report(backend: &str, ping: Result<(), String>) -> (Status, Json<Value>) {
    match ping {
        Ok(()) => (
            Status::Ok,
            Json(json!({
                "ok": true,
                "status": "ok",
                "database": "connected",
                "backend": backend,
                "serverTime": now()
            })),
        ),
        Err(e) => {
            log::warn!("[health] {} ping failed: {}", backend, e);
            (
                Status::ServiceUnavailable,
                Json(json!({
                    "ok": false,
                    "status": "degraded",
                    "database": "disconnected",
                    "backend": backend,
                    "error": e,
                    "serverTime": now()
                })),
            )
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![health]
}
