use rocket::fairing::{Fairing, Info, Kind};
use rocket::tokio;
use rocket::{Orbit, Rocket};
use std::sync::Arc;
use std::time::Duration;

use crate::rate_limit::{RateLimiter, GENERATION_WINDOW};
use crate::store::Store;

const RATE_LIMIT_SWEEP: Duration = Duration::from_secs(10 * 60);
const STORE_PING_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct BackgroundTasks;

#[rocket::async_trait]
impl Fairing for BackgroundTasks {
    fn info(&self) -> Info {
        Info {
            name: "Background Tasks",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        // Rate limiter sweep
        if let Some(limiter) = rocket.state::<Arc<RateLimiter>>() {
            let rl = Arc::clone(limiter);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(RATE_LIMIT_SWEEP).await;
                    rl.cleanup(GENERATION_WINDOW);
                }
            });
        }

        // Store connectivity watch; only logs transitions
        if let Some(store) = rocket.state::<Arc<dyn Store>>() {
            let s = Arc::clone(store);
            tokio::spawn(async move {
                let mut healthy = true;
                loop {
                    tokio::time::sleep(STORE_PING_INTERVAL).await;
                    let probe = Arc::clone(&s);
                    let result = tokio::task::spawn_blocking(move || probe.ping())
                        .await
                        .unwrap_or_else(|e| Err(e.to_string()));
                    match (healthy, result) {
                        (true, Err(e)) => {
                            log::error!("[task] database store unreachable: {}", e);
                            healthy = false;
                        }
                        (false, Ok(())) => {
                            log::info!("[task] database store reachable again");
                            healthy = true;
                        }
                        _ => {}
                    }
                }
            });
        }

        log::info!("[task] Background tasks started");
    }
}
