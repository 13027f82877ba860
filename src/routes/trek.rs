use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{api_error, blocking, ApiError, ApiResult};
use crate::ai::{self, prompts, Completer};
use crate::config::Config;
use crate::models::itinerary::{Filters, ItineraryForm, KIND_CUSTOM};
use crate::models::month_start;
use crate::models::user::User;
use crate::normalizer::normalize_itinerary;
use crate::rate_limit::{generation_key, RateLimiter, GENERATION_WINDOW};
use crate::security::auth::{AuthenticatedUser, ClientIp, OptionalUser};
use crate::store::Store;

// ── Intro ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct StartRequest {
    #[serde(default)]
    pub location: String,
}

#[post("/start", format = "json", data = "<body>")]
pub async fn start(
    auth: AuthenticatedUser,
    completer: &State<Arc<dyn Completer>>,
    config: &State<Arc<Config>>,
    body: Json<StartRequest>,
) -> ApiResult {
    let completer = completer.inner().clone();
    let intro_model = config.openai.intro_model.clone();
    let user_id = auth.user.id;
    let location = body.into_inner().location;
    blocking(move || start_reply(&*completer, &intro_model, user_id, &location)).await
}

pub fn start_reply(
    completer: &dyn Completer,
    intro_model: &str,
    user_id: i64,
    location: &str,
) -> Result<Value, ApiError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(api_error(Status::BadRequest, "Location is required."));
    }
    match ai::complete_text(completer, &ai::intro_request(location, intro_model)) {
        Ok(reply) => Ok(json!({ "ok": true, "reply": reply, "userId": user_id })),
        Err(e) => {
            log::error!("[trek] intro for user {} failed: {}", user_id, e);
            Err(api_error(
                Status::InternalServerError,
                "Failed to generate intro response.",
            ))
        }
    }
}

// ── Finalize ───────────────────────────────────────────

#[derive(Debug, Deserialize, Default, Clone)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub location: String,
    pub filters: Option<Filters>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub title: String,
}

/// Collaborators for one generation.
pub struct Generation<'a> {
    pub store: &'a dyn Store,
    pub completer: &'a dyn Completer,
    pub limiter: &'a RateLimiter,
    pub config: &'a Config,
}

#[post("/finalize", format = "json", data = "<body>")]
pub async fn finalize(
    user: OptionalUser,
    client_ip: ClientIp,
    store: &State<Arc<dyn Store>>,
    completer: &State<Arc<dyn Completer>>,
    limiter: &State<Arc<RateLimiter>>,
    config: &State<Arc<Config>>,
    body: Json<FinalizeRequest>,
) -> ApiResult {
    let store = store.inner().clone();
    let completer = completer.inner().clone();
    let limiter = limiter.inner().clone();
    let config = config.inner().clone();
    let user = user.0.map(|auth| auth.user);
    let req = body.into_inner();
    blocking(move || {
        let generation = Generation {
            store: &*store,
            completer: &*completer,
            limiter: &limiter,
            config: &config,
        };
        generation.run(user.as_ref(), &client_ip.0, &req)
    })
    .await
}

impl Generation<'_> {
    /// Quota, generate, normalize, then save for signed-in callers.
    pub fn run(
        &self,
        user: Option<&User>,
        client_ip: &str,
        req: &FinalizeRequest,
    ) -> Result<Value, ApiError> {
        let location = req.location.trim();
        let filters = match req.filters {
            Some(ref f) if !location.is_empty() => f,
            _ => {
                return Err(api_error(
                    Status::BadRequest,
                    "Location and filters are required.",
                ))
            }
        };

        match user {
            Some(u) => self.check_quota(u)?,
            None => self.check_anonymous_limit(client_ip)?,
        }

        let prompt = prompts::finalize_prompt(location, filters, &req.comments);
        let reply = ai::complete_text(self.completer, &ai::itinerary_request(prompt)).map_err(|e| {
            log::error!("[trek] generation for {} failed: {}", location, e);
            api_error(Status::InternalServerError, "Failed to generate itinerary")
        })?;
        let content = normalize_itinerary(&reply);

        let user = match user {
            Some(u) => u,
            None => {
                let remaining = self.limiter.remaining(
                    &generation_key(client_ip),
                    self.config.anonymous_hourly_generations as u64,
                    GENERATION_WINDOW,
                );
                return Ok(json!({
                    "ok": true,
                    "reply": content,
                    "saved": false,
                    "isAuthenticated": false,
                    "remainingGenerations": remaining,
                    "message": "Itinerary generated but not saved (user not authenticated)"
                }));
            }
        };

        if let Err(e) = self.store.generation_record(user.id) {
            log::warn!("[trek] could not record generation for user {}: {}", user.id, e);
        }

        let title = match req.title.trim() {
            "" => format!("{} Trek", location),
            t => t.to_string(),
        };
        let form = ItineraryForm {
            title,
            location: location.to_string(),
            filters: filters.clone(),
            comments: req.comments.clone(),
            content: content.clone(),
            kind: Some(KIND_CUSTOM.to_string()),
            trek_id: None,
            trek_details: None,
        };
        match self.store.itinerary_create(user.id, &form) {
            Ok(id) => {
                log::info!("[trek] saved itinerary {} for user {}", id, user.id);
                Ok(json!({
                    "ok": true,
                    "reply": content,
                    "saved": true,
                    "itineraryId": id,
                    "message": "Itinerary saved to database"
                }))
            }
            Err(e) => {
                log::warn!("[trek] save for user {} failed: {}", user.id, e);
                Ok(json!({
                    "ok": true,
                    "reply": content,
                    "saved": false,
                    "warning": "Generated itinerary but failed to save to database"
                }))
            }
        }
    }

    fn check_quota(&self, user: &User) -> Result<(), ApiError> {
        if user.is_premium() {
            return Ok(());
        }
        let limit = self.config.free_monthly_generations as i64;
        let used = self.store.generation_count_since(user.id, &month_start());
        if used >= limit {
            log::info!("[trek] user {} hit the monthly limit ({})", user.id, limit);
            return Err((
                Status::Forbidden,
                Json(json!({
                    "ok": false,
                    "error": "Monthly itinerary limit reached. Upgrade to Pro for unlimited itineraries.",
                    "limit": limit,
                    "used": used,
                    "upgrade": true
                })),
            ));
        }
        Ok(())
    }

    fn check_anonymous_limit(&self, client_ip: &str) -> Result<(), ApiError> {
        let max = self.config.anonymous_hourly_generations as u64;
        if self
            .limiter
            .check_and_record(&generation_key(client_ip), max, GENERATION_WINDOW)
        {
            Ok(())
        } else {
            Err(api_error(
                Status::TooManyRequests,
                "Too many itineraries generated. Sign in or try again later.",
            ))
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![start, finalize]
}
