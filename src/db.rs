use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_pool_at(path: &str) -> Result<DbPool, String> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| format!("{}: {}", dir.display(), e))?;
        }
    }
    let manager = SqliteConnectionManager::file(path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| e.to_string())?;

    // WAL for concurrent readers
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|e| e.to_string())?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Accounts, keyed by Firebase uid
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            firebase_uid TEXT UNIQUE NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            sub_status TEXT NOT NULL DEFAULT 'free',
            sub_billing_interval TEXT NOT NULL DEFAULT '',
            sub_start_date TEXT,
            sub_end_date TEXT,
            stripe_customer_id TEXT,
            stripe_subscription_id TEXT,
            dark_mode INTEGER NOT NULL DEFAULT 0,
            default_difficulty TEXT NOT NULL DEFAULT '',
            default_accommodation TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            last_login_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        CREATE INDEX IF NOT EXISTS idx_users_subscription ON users(stripe_subscription_id);

        -- Saved itineraries
        CREATE TABLE IF NOT EXISTS itineraries (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            location TEXT NOT NULL,
            filter_accommodation TEXT NOT NULL DEFAULT '',
            filter_difficulty TEXT NOT NULL DEFAULT '',
            filter_technical TEXT NOT NULL DEFAULT '',
            filter_altitude TEXT NOT NULL DEFAULT '',
            comments TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'custom',
            trek_id TEXT,
            trek_details_json TEXT,
            created_at TEXT NOT NULL,
            last_viewed TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_itineraries_user ON itineraries(user_id, created_at);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_itineraries_user_trek ON itineraries(user_id, trek_id);

        -- One row per completed generation, for monthly quotas
        CREATE TABLE IF NOT EXISTS generations (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_generations_user ON generations(user_id, created_at);
        ",
    )?;

    Ok(())
}
