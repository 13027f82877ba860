use log::{error, info, warn};
use std::path::Path;
use std::process;
use std::sync::Arc;

use crate::ai::openai::OpenAiClient;
use crate::ai::Completer;
use crate::billing::stripe::StripeClient;
use crate::billing::Billing;
use crate::config::{Config, DatabaseConfig};
use crate::rate_limit::RateLimiter;
use crate::security::auth::IdentityVerifier;
use crate::security::firebase::FirebaseVerifier;
use crate::store::mongo::MongoStore;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Everything the server manages, built once before launch.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub completer: Arc<dyn Completer>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub billing: Arc<dyn Billing>,
    pub limiter: Arc<RateLimiter>,
}

fn abort(what: &str, cause: impl std::fmt::Display) -> ! {
    error!("  {}: {}", what, cause);
    error!("Boot check FAILED. Aborting.");
    process::exit(1);
}

/// Open the configured store. Mongo connects lazily; SQLite opens the file.
pub fn open_store(database: &DatabaseConfig) -> Result<Arc<dyn Store>, String> {
    match database {
        DatabaseConfig::Mongo { uri, db_name } => {
            Ok(Arc::new(MongoStore::new(uri, db_name)?) as Arc<dyn Store>)
        }
        DatabaseConfig::Sqlite { path } => Ok(Arc::new(SqliteStore::new_at(path)?) as Arc<dyn Store>),
    }
}

/// Run all boot checks and build the managed state. Call this before
/// Rocket launches; the Mongo driver must not be set up inside the runtime.
pub fn run() -> AppState {
    info!("TrekAI boot check starting...");

    let mut warnings = 0u32;

    // ── 1. Configuration ───────────────────────────────
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => abort("Invalid configuration", e),
    };

    // ── 2. Store ───────────────────────────────────────
    let backend = config.database.backend();
    let store = match open_store(&config.database) {
        Ok(s) => s,
        Err(e) => abort(&format!("Could not open {} store", backend), e),
    };
    if let Err(e) = store.run_migrations() {
        abort(&format!("{} migrations failed", backend), e);
    }
    match store.ping() {
        Ok(()) => info!("  Database ({}) reachable", backend),
        Err(e) => {
            warn!("  Database ({}) unreachable: {} (saving will degrade)", backend, e);
            warnings += 1;
        }
    }

    // ── 3. Providers ───────────────────────────────────
    let completer = match OpenAiClient::new(&config.openai) {
        Ok(c) => c,
        Err(e) => abort("OpenAI client", e),
    };
    let verifier = match FirebaseVerifier::new(&config.firebase) {
        Ok(v) => v,
        Err(e) => abort("Firebase verifier", e),
    };
    let billing = match StripeClient::new(&config.stripe) {
        Ok(b) => b,
        Err(e) => abort("Stripe client", e),
    };
    if config.stripe.pro_monthly_price.is_empty() || config.stripe.pro_annual_price.is_empty() {
        warn!("  Stripe Pro price ids not set (plans will list empty ids)");
        warnings += 1;
    }

    // ── 4. Rocket.toml exists ──────────────────────────
    if !Path::new("Rocket.toml").exists() {
        warn!("  Rocket.toml not found, using default config");
        warnings += 1;
    }

    // ── Summary ────────────────────────────────────────
    if warnings > 0 {
        warn!(
            "Boot check passed with {} warning(s). Some features may not work correctly.",
            warnings
        );
    } else {
        info!("Boot check passed. All systems go.");
    }

    AppState {
        config: Arc::new(config),
        store,
        completer: Arc::new(completer),
        verifier: Arc::new(verifier),
        billing: Arc::new(billing),
        limiter: Arc::new(RateLimiter::new()),
    }
}
