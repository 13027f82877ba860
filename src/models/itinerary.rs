use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const KIND_CUSTOM: &str = "custom";
pub const KIND_POPULAR_TREK: &str = "popular-trek";

/// Trek preferences chosen in the generator form.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Filters {
    pub accommodation: String,
    pub difficulty: String,
    pub technical: String,
    pub altitude: String,
}

/// Catalogue facts copied from a popular trek.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TrekDetails {
    pub country: String,
    pub region: String,
    pub max_elevation: Option<f64>,
    pub distance: Option<f64>,
    pub summary: String,
    pub duration: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub location: String,
    pub filters: Filters,
    pub comments: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String, // custom, popular-trek
    pub trek_id: Option<String>,
    pub trek_details: Option<TrekDetails>,
    pub created_at: String,
    pub last_viewed: String,
}

/// A new itinerary as submitted by a client or produced by generation.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub trek_id: Option<String>,
    pub trek_details: Option<TrekDetails>,
}

impl ItineraryForm {
    pub fn kind(&self) -> &str {
        match self.kind.as_deref() {
            Some(KIND_POPULAR_TREK) => KIND_POPULAR_TREK,
            _ => KIND_CUSTOM,
        }
    }

    /// Trek id, ignoring blanks.
    pub fn trek_id(&self) -> Option<&str> {
        self.trek_id.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryUpdate {
    pub title: Option<String>,
    pub location: Option<String>,
    pub filters: Option<Filters>,
    pub comments: Option<String>,
    pub content: Option<String>,
}

impl Itinerary {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let details_json: Option<String> = row.get(12)?;
        Ok(Itinerary {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            location: row.get(3)?,
            filters: Filters {
                accommodation: row.get(4)?,
                difficulty: row.get(5)?,
                technical: row.get(6)?,
                altitude: row.get(7)?,
            },
            comments: row.get(8)?,
            content: row.get(9)?,
            kind: row.get(10)?,
            trek_id: row.get(11)?,
            trek_details: details_json.and_then(|j| serde_json::from_str(&j).ok()),
            created_at: row.get(13)?,
            last_viewed: row.get(14)?,
        })
    }

    const SELECT_COLS: &'static str =
        "id, user_id, title, location, filter_accommodation, filter_difficulty, filter_technical, filter_altitude, comments, content, kind, trek_id, trek_details_json, created_at, last_viewed";

    // ── Lookups ──

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Itinerary> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("SELECT {} FROM itineraries WHERE id = ?1", Self::SELECT_COLS),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_by_trek(pool: &DbPool, user_id: i64, trek_id: &str) -> Option<Itinerary> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM itineraries WHERE user_id = ?1 AND trek_id = ?2",
                Self::SELECT_COLS
            ),
            params![user_id, trek_id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_for_user(pool: &DbPool, user_id: i64) -> Vec<Itinerary> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!(
            "SELECT {} FROM itineraries WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            Self::SELECT_COLS
        )) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![user_id], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count_for_user(pool: &DbPool, user_id: i64) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM itineraries WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    // ── Create ──

    pub fn create(pool: &DbPool, user_id: i64, form: &ItineraryForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let now = super::now();
        let details = match form.trek_details {
            Some(ref d) => Some(serde_json::to_string(d).map_err(|e| e.to_string())?),
            None => None,
        };
        conn.execute(
            "INSERT INTO itineraries (user_id, title, location, filter_accommodation, filter_difficulty,
                filter_technical, filter_altitude, comments, content, kind, trek_id, trek_details_json,
                created_at, last_viewed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                user_id,
                form.title.trim(),
                form.location.trim(),
                form.filters.accommodation,
                form.filters.difficulty,
                form.filters.technical,
                form.filters.altitude,
                form.comments.trim(),
                form.content,
                form.kind(),
                form.trek_id(),
                details,
                now,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    // ── Update ──

    pub fn update(pool: &DbPool, id: i64, update: &ItineraryUpdate) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let filters = update.filters.as_ref();
        conn.execute(
            "UPDATE itineraries SET
                title = COALESCE(?1, title),
                location = COALESCE(?2, location),
                comments = COALESCE(?3, comments),
                content = COALESCE(?4, content),
                filter_accommodation = COALESCE(?5, filter_accommodation),
                filter_difficulty = COALESCE(?6, filter_difficulty),
                filter_technical = COALESCE(?7, filter_technical),
                filter_altitude = COALESCE(?8, filter_altitude)
             WHERE id = ?9",
            params![
                update.title.as_deref().map(str::trim),
                update.location.as_deref().map(str::trim),
                update.comments.as_deref().map(str::trim),
                update.content,
                filters.map(|f| f.accommodation.as_str()),
                filters.map(|f| f.difficulty.as_str()),
                filters.map(|f| f.technical.as_str()),
                filters.map(|f| f.altitude.as_str()),
                id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn touch_viewed(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE itineraries SET last_viewed = ?1 WHERE id = ?2",
            params![super::now(), id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Delete ──

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM itineraries WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Generation log ──

    pub fn record_generation(pool: &DbPool, user_id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO generations (user_id, created_at) VALUES (?1, ?2)",
            params![user_id, super::now()],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn count_generations_since(pool: &DbPool, user_id: i64, since: &str) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM generations WHERE user_id = ?1 AND created_at >= ?2",
            params![user_id, since],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }
}
