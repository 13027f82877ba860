use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const STATUS_FREE: &str = "free";
pub const STATUS_PREMIUM: &str = "premium";

/// Accepted values for `Preferences::default_difficulty` (empty = unset).
pub const DIFFICULTIES: &[&str] = &["easy", "moderate", "challenging", ""];
/// Accepted values for `Preferences::default_accommodation` (empty = unset).
pub const ACCOMMODATIONS: &[&str] = &["camping", "hostel", "hotel", "guesthouse", ""];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub status: String, // free, premium
    pub billing_interval: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub dark_mode: bool,
    pub default_difficulty: String,
    pub default_accommodation: String,
}

impl Preferences {
    /// Name of the first field holding a value outside its allowed set.
    pub fn invalid_field(&self) -> Option<&'static str> {
        if !DIFFICULTIES.contains(&self.default_difficulty.as_str()) {
            return Some("defaultDifficulty");
        }
        if !ACCOMMODATIONS.contains(&self.default_accommodation.as_str()) {
            return Some("defaultAccommodation");
        }
        None
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub firebase_uid: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub subscription: Subscription,
    pub preferences: Preferences,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

/// Fields for a user created on first sign-in.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub firebase_uid: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewUser {
    /// Split a display name into first name and the rest.
    pub fn from_identity(uid: &str, email: &str, display_name: &str) -> Self {
        let mut parts = display_name.split_whitespace();
        let first_name = parts.next().unwrap_or("").to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");
        NewUser {
            firebase_uid: uid.to_string(),
            email: email.trim().to_lowercase(),
            first_name,
            last_name,
        }
    }
}

/// Profile edit; `None` leaves the stored value as is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferences: Option<Preferences>,
}

/// Subscription change driven by billing; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionUpdate {
    pub status: Option<String>,
    pub billing_interval: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub clear_subscription_id: bool,
}

impl User {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let dark_mode: i32 = row.get(11)?;
        Ok(User {
            id: row.get(0)?,
            firebase_uid: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            subscription: Subscription {
                status: row.get(5)?,
                billing_interval: row.get(6)?,
                start_date: row.get(7)?,
                end_date: row.get(8)?,
                stripe_customer_id: row.get(9)?,
                stripe_subscription_id: row.get(10)?,
            },
            preferences: Preferences {
                dark_mode: dark_mode != 0,
                default_difficulty: row.get(12)?,
                default_accommodation: row.get(13)?,
            },
            created_at: row.get(14)?,
            last_login_at: row.get(15)?,
        })
    }

    const SELECT_COLS: &'static str =
        "id, firebase_uid, email, first_name, last_name, sub_status, sub_billing_interval, sub_start_date, sub_end_date, stripe_customer_id, stripe_subscription_id, dark_mode, default_difficulty, default_accommodation, created_at, last_login_at";

    // ── Lookups ──

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<User> {
        Self::query_one(pool, "id = ?1", &id)
    }

    pub fn get_by_firebase_uid(pool: &DbPool, uid: &str) -> Option<User> {
        Self::query_one(pool, "firebase_uid = ?1", &uid)
    }

    pub fn get_by_subscription_id(pool: &DbPool, subscription_id: &str) -> Option<User> {
        Self::query_one(pool, "stripe_subscription_id = ?1", &subscription_id)
    }

    fn query_one(pool: &DbPool, clause: &str, value: &dyn rusqlite::ToSql) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE {}", Self::SELECT_COLS, clause),
            params![value],
            Self::from_row,
        )
        .ok()
    }

    // ── Create ──

    pub fn create(pool: &DbPool, new: &NewUser) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let now = super::now();
        conn.execute(
            "INSERT INTO users (firebase_uid, email, first_name, last_name, sub_status, sub_start_date, created_at, last_login_at)
             VALUES (?1, ?2, ?3, ?4, 'free', ?5, ?5, ?5)",
            params![new.firebase_uid, new.email, new.first_name, new.last_name, now],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    // ── Update ──

    pub fn touch_last_login(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
            params![super::now(), id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn update_profile(pool: &DbPool, id: i64, update: &ProfileUpdate) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        if let Some(ref first) = update.first_name {
            conn.execute(
                "UPDATE users SET first_name = ?1 WHERE id = ?2",
                params![first.trim(), id],
            )
            .map_err(|e| e.to_string())?;
        }
        if let Some(ref last) = update.last_name {
            conn.execute(
                "UPDATE users SET last_name = ?1 WHERE id = ?2",
                params![last.trim(), id],
            )
            .map_err(|e| e.to_string())?;
        }
        if let Some(ref prefs) = update.preferences {
            let dark: i32 = if prefs.dark_mode { 1 } else { 0 };
            conn.execute(
                "UPDATE users SET dark_mode = ?1, default_difficulty = ?2, default_accommodation = ?3 WHERE id = ?4",
                params![dark, prefs.default_difficulty, prefs.default_accommodation, id],
            )
            .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    pub fn set_stripe_customer(pool: &DbPool, id: i64, customer_id: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET stripe_customer_id = ?1 WHERE id = ?2",
            params![customer_id, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn update_subscription(
        pool: &DbPool,
        id: i64,
        update: &SubscriptionUpdate,
    ) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET
                sub_status = COALESCE(?1, sub_status),
                sub_billing_interval = COALESCE(?2, sub_billing_interval),
                sub_start_date = COALESCE(?3, sub_start_date),
                sub_end_date = COALESCE(?4, sub_end_date),
                stripe_subscription_id = CASE WHEN ?6 THEN NULL ELSE COALESCE(?5, stripe_subscription_id) END
             WHERE id = ?7",
            params![
                update.status,
                update.billing_interval,
                update.start_date,
                update.end_date,
                update.stripe_subscription_id,
                update.clear_subscription_id,
                id
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Delete ──

    /// Remove the user together with their itineraries and generation log.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM itineraries WHERE user_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM generations WHERE user_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())
    }

    // ── Helpers ──

    pub fn is_premium(&self) -> bool {
        self.subscription.status == STATUS_PREMIUM
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
