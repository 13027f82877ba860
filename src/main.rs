#[macro_use]
extern crate rocket;

mod ai;
mod billing;
mod boot;
mod config;
mod cors;
mod db;
mod models;
mod normalizer;
mod rate_limit;
mod routes;
mod security;
mod store;
mod tasks;


use rocket::{Build, Rocket};

use config::NETLIFY_PREVIEW_SUFFIX;

/// Assemble the server around already-built state.
pub fn build(state: boot::AppState) -> Rocket<Build> {
    let cors = cors::Cors::new(state.config.allowed_origins.clone(), NETLIFY_PREVIEW_SUFFIX);

    rocket::build()
        .manage(state.config)
        .manage(state.store)
        .manage(state.completer)
        .manage(state.verifier)
        .manage(state.billing)
        .manage(state.limiter)
        .attach(cors)
        .attach(tasks::BackgroundTasks)
        .mount("/", routes![routes::health::banner, cors::preflight])
        .mount("/api", routes::health::routes())
        .mount("/api", routes::trek::routes())
        .mount("/api/itineraries", routes::itineraries::routes())
        .mount("/api/users", routes::users::routes())
        .mount("/api/subscriptions", routes::subscriptions::routes())
        .register("/", routes::catchers())
}

fn main() {
    env_logger::init();

    // Boot check: config, store, providers. Runs before the async runtime starts.
    let state = boot::run();

    if let Err(e) = rocket::execute(build(state).launch()) {
        log::error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
