use crate::db::DbPool;
use crate::models::itinerary::{Itinerary, ItineraryForm, ItineraryUpdate};
use crate::models::user::{NewUser, ProfileUpdate, SubscriptionUpdate, User};

use super::Store;

/// SQLite-backed implementation of the Store trait.
/// Wraps an r2d2 connection pool and delegates to model methods.
pub struct SqliteStore {
    pub pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn new_at(path: &str) -> Result<Self, String> {
        let pool = crate::db::init_pool_at(path)?;
        Ok(Self { pool })
    }
}

impl Store for SqliteStore {
    // ── Lifecycle ───────────────────────────────────────────────────

    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn run_migrations(&self) -> Result<(), String> {
        crate::db::run_migrations(&self.pool).map_err(|e| e.to_string())
    }

    fn ping(&self) -> Result<(), String> {
        let conn = self.pool.get().map_err(|e| e.to_string())?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Users ───────────────────────────────────────────────────────

    fn user_get_by_id(&self, id: i64) -> Option<User> {
        User::get_by_id(&self.pool, id)
    }

    fn user_get_by_firebase_uid(&self, uid: &str) -> Option<User> {
        User::get_by_firebase_uid(&self.pool, uid)
    }

    fn user_get_by_subscription_id(&self, subscription_id: &str) -> Option<User> {
        User::get_by_subscription_id(&self.pool, subscription_id)
    }

    fn user_create(&self, new: &NewUser) -> Result<i64, String> {
        User::create(&self.pool, new)
    }

    fn user_touch_last_login(&self, id: i64) -> Result<(), String> {
        User::touch_last_login(&self.pool, id)
    }

    fn user_update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(), String> {
        User::update_profile(&self.pool, id, update)
    }

    fn user_set_stripe_customer(&self, id: i64, customer_id: &str) -> Result<(), String> {
        User::set_stripe_customer(&self.pool, id, customer_id)
    }

    fn user_update_subscription(
        &self,
        id: i64,
        update: &SubscriptionUpdate,
    ) -> Result<(), String> {
        User::update_subscription(&self.pool, id, update)
    }

    fn user_delete(&self, id: i64) -> Result<(), String> {
        User::delete(&self.pool, id)
    }

    // ── Itineraries ─────────────────────────────────────────────────

    fn itinerary_list_for_user(&self, user_id: i64) -> Vec<Itinerary> {
        Itinerary::list_for_user(&self.pool, user_id)
    }

    fn itinerary_find_by_id(&self, id: i64) -> Option<Itinerary> {
        Itinerary::find_by_id(&self.pool, id)
    }

    fn itinerary_find_by_trek(&self, user_id: i64, trek_id: &str) -> Option<Itinerary> {
        Itinerary::find_by_trek(&self.pool, user_id, trek_id)
    }

    fn itinerary_create(&self, user_id: i64, form: &ItineraryForm) -> Result<i64, String> {
        Itinerary::create(&self.pool, user_id, form)
    }

    fn itinerary_update(&self, id: i64, update: &ItineraryUpdate) -> Result<(), String> {
        Itinerary::update(&self.pool, id, update)
    }

    fn itinerary_touch_viewed(&self, id: i64) -> Result<(), String> {
        Itinerary::touch_viewed(&self.pool, id)
    }

    fn itinerary_delete(&self, id: i64) -> Result<(), String> {
        Itinerary::delete(&self.pool, id)
    }

    fn itinerary_count_for_user(&self, user_id: i64) -> i64 {
        Itinerary::count_for_user(&self.pool, user_id)
    }

    // ── Generation log ──────────────────────────────────────────────

    fn generation_record(&self, user_id: i64) -> Result<(), String> {
        Itinerary::record_generation(&self.pool, user_id)
    }

    fn generation_count_since(&self, user_id: i64, since: &str) -> i64 {
        Itinerary::count_generations_since(&self.pool, user_id, since)
    }
}
