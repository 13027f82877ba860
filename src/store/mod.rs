use crate::models::itinerary::{Itinerary, ItineraryForm, ItineraryUpdate};
use crate::models::user::{NewUser, ProfileUpdate, SubscriptionUpdate, User};

pub mod mongo;
pub mod sqlite;

/// Unified data-access trait. Every database operation goes through here.
/// Implementations: `MongoStore` (production, mongodb sync driver) and
/// `SqliteStore` (rusqlite/r2d2, for single-host deploys and tests).
pub trait Store: Send + Sync {
    // ── Lifecycle ───────────────────────────────────────────────────
    fn backend(&self) -> &'static str;
    fn run_migrations(&self) -> Result<(), String>;
    fn ping(&self) -> Result<(), String>;

    // ── Users ───────────────────────────────────────────────────────
    fn user_get_by_id(&self, id: i64) -> Option<User>;
    fn user_get_by_firebase_uid(&self, uid: &str) -> Option<User>;
    fn user_get_by_subscription_id(&self, subscription_id: &str) -> Option<User>;
    fn user_create(&self, new: &NewUser) -> Result<i64, String>;
    fn user_touch_last_login(&self, id: i64) -> Result<(), String>;
    fn user_update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(), String>;
    fn user_set_stripe_customer(&self, id: i64, customer_id: &str) -> Result<(), String>;
    fn user_update_subscription(&self, id: i64, update: &SubscriptionUpdate)
        -> Result<(), String>;
    /// Deletes the user and everything they own.
    fn user_delete(&self, id: i64) -> Result<(), String>;

    // ── Itineraries ─────────────────────────────────────────────────
    /// Newest first.
    fn itinerary_list_for_user(&self, user_id: i64) -> Vec<Itinerary>;
    fn itinerary_find_by_id(&self, id: i64) -> Option<Itinerary>;
    fn itinerary_find_by_trek(&self, user_id: i64, trek_id: &str) -> Option<Itinerary>;
    fn itinerary_create(&self, user_id: i64, form: &ItineraryForm) -> Result<i64, String>;
    fn itinerary_update(&self, id: i64, update: &ItineraryUpdate) -> Result<(), String>;
    fn itinerary_touch_viewed(&self, id: i64) -> Result<(), String>;
    fn itinerary_delete(&self, id: i64) -> Result<(), String>;
    fn itinerary_count_for_user(&self, user_id: i64) -> i64;

    /// Fetch an itinerary only if `user_id` owns it.
    fn itinerary_find_owned(&self, user_id: i64, id: i64) -> Option<Itinerary> {
        self.itinerary_find_by_id(id)
            .filter(|it| it.user_id == user_id)
    }

    // ── Generation log ──────────────────────────────────────────────
    fn generation_record(&self, user_id: i64) -> Result<(), String>;
    /// Generations by `user_id` at or after the RFC 3339 instant `since`.
    fn generation_count_since(&self, user_id: i64, since: &str) -> i64;
}
