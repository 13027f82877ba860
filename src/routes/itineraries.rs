use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, blocking, internal, ApiError, ApiResult};
use crate::models::itinerary::{ItineraryForm, ItineraryUpdate, KIND_POPULAR_TREK};
use crate::normalizer::normalize_itinerary;
use crate::security::auth::AuthenticatedUser;
use crate::store::Store;

fn not_found() -> ApiError {
    api_error(Status::NotFound, "Itinerary not found")
}

// ── Handlers ───────────────────────────────────────────

#[get("/")]
pub async fn list_itineraries(auth: AuthenticatedUser, store: &State<Arc<dyn Store>>) -> ApiResult {
    let store = store.inner().clone();
    blocking(move || Ok(list_for(&*store, auth.user.id))).await
}

#[get("/<id>")]
pub async fn get_itinerary(auth: AuthenticatedUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    let store = store.inner().clone();
    blocking(move || view(&*store, auth.user.id, id)).await
}

#[post("/", format = "json", data = "<body>")]
pub async fn create_itinerary(
    auth: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    body: Json<ItineraryForm>,
) -> Result<(Status, Json<Value>), ApiError> {
    let store = store.inner().clone();
    let form = body.into_inner();
    blocking(move || save(&*store, auth.user.id, form))
        .await
        .map(|json| (Status::Created, json))
}

#[put("/<id>", format = "json", data = "<body>")]
pub async fn update_itinerary(
    auth: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
    body: Json<ItineraryUpdate>,
) -> ApiResult {
    let store = store.inner().clone();
    let update = body.into_inner();
    blocking(move || edit(&*store, auth.user.id, id, update)).await
}

#[delete("/<id>")]
pub async fn delete_itinerary(auth: AuthenticatedUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    let store = store.inner().clone();
    blocking(move || remove(&*store, auth.user.id, id)).await
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list_itineraries,
        get_itinerary,
        create_itinerary,
        update_itinerary,
        delete_itinerary
    ]
}

// ── Operations ─────────────────────────────────────────

pub fn list_for(store: &dyn Store, user_id: i64) -> Value {
    let itineraries = store.itinerary_list_for_user(user_id);
    json!({ "ok": true, "count": itineraries.len(), "itineraries": itineraries })
}

/// Owner-only fetch; touches `last_viewed`.
pub fn view(store: &dyn Store, user_id: i64, id: i64) -> Result<Value, ApiError> {
    store.itinerary_find_owned(user_id, id).ok_or_else(not_found)?;
    if let Err(e) = store.itinerary_touch_viewed(id) {
        log::warn!("[itineraries] last_viewed update for {} failed: {}", id, e);
    }
    let itinerary = store.itinerary_find_by_id(id).ok_or_else(not_found)?;
    Ok(json!({ "ok": true, "itinerary": itinerary }))
}

/// Validate, normalize the content and save.
pub fn save(store: &dyn Store, user_id: i64, mut form: ItineraryForm) -> Result<Value, ApiError> {
    if form.title.trim().is_empty() || form.location.trim().is_empty() || form.content.trim().is_empty() {
        return Err(api_error(
            Status::BadRequest,
            "Title, location and content are required",
        ));
    }
    if form.kind() == KIND_POPULAR_TREK && form.trek_id().is_none() {
        return Err(api_error(Status::BadRequest, "Popular treks need a trekId"));
    }
    if let Some(trek_id) = form.trek_id() {
        if store.itinerary_find_by_trek(user_id, trek_id).is_some() {
            return Err(api_error(Status::Conflict, "This trek is already saved"));
        }
    }

    form.content = normalize_itinerary(&form.content);
    let id = match store.itinerary_create(user_id, &form) {
        Ok(id) => id,
        Err(e) => {
            // Lost a race on the (user, trek) unique index
            if let Some(trek_id) = form.trek_id() {
                if store.itinerary_find_by_trek(user_id, trek_id).is_some() {
                    return Err(api_error(Status::Conflict, "This trek is already saved"));
                }
            }
            return Err(internal("itinerary create", e));
        }
    };
    let itinerary = store
        .itinerary_find_by_id(id)
        .ok_or_else(|| internal("itinerary create", format!("{} missing after insert", id)))?;
    Ok(json!({ "ok": true, "itinerary": itinerary }))
}

pub fn edit(
    store: &dyn Store,
    user_id: i64,
    id: i64,
    mut update: ItineraryUpdate,
) -> Result<Value, ApiError> {
    store.itinerary_find_owned(user_id, id).ok_or_else(not_found)?;
    let blank = |v: &Option<String>| v.as_deref().map_or(false, |s| s.trim().is_empty());
    if blank(&update.title) || blank(&update.location) || blank(&update.content) {
        return Err(api_error(
            Status::BadRequest,
            "Title, location and content cannot be empty",
        ));
    }
    update.content = update.content.as_deref().map(normalize_itinerary);
    store
        .itinerary_update(id, &update)
        .map_err(|e| internal("itinerary update", e))?;
    let itinerary = store.itinerary_find_by_id(id).ok_or_else(not_found)?;
    Ok(json!({ "ok": true, "itinerary": itinerary }))
}

pub fn remove(store: &dyn Store, user_id: i64, id: i64) -> Result<Value, ApiError> {
    store.itinerary_find_owned(user_id, id).ok_or_else(not_found)?;
    store
        .itinerary_delete(id)
        .map_err(|e| internal("itinerary delete", e))?;
    Ok(json!({ "ok": true, "message": "Itinerary deleted successfully" }))
}
