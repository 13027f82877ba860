use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Window for anonymous itinerary generation.
pub const GENERATION_WINDOW: Duration = Duration::from_secs(3600);

/// In-memory sliding-window limiter keyed by (bucket, ip_hash).
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bucket key for anonymous generations from one client address.
/// Addresses are hashed so raw IPs never sit in memory.
pub fn generation_key(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    format!("generate:{}", &hex::encode(digest)[..16])
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an attempt and return true if it is under the limit.
    pub fn check_and_record(&self, key: &str, max_attempts: u64, window: Duration) -> bool {
        self.check_and_record_at(key, max_attempts, window, Instant::now())
    }

    pub fn check_and_record_at(
        &self,
        key: &str,
        max_attempts: u64,
        window: Duration,
        now: Instant,
    ) -> bool {
        let mut map = self.entries();
        let attempts = map.entry(key.to_string()).or_default();
        prune(attempts, now, window);

        if (attempts.len() as u64) < max_attempts {
            attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Attempts left in the window, without recording one.
    pub fn remaining(&self, key: &str, max_attempts: u64, window: Duration) -> u64 {
        let mut map = self.entries();
        let used = match map.get_mut(key) {
            Some(attempts) => {
                prune(attempts, Instant::now(), window);
                attempts.len() as u64
            }
            None => 0,
        };
        max_attempts.saturating_sub(used)
    }

    /// Drop keys with no attempt newer than `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        let mut map = self.entries();
        map.retain(|_, attempts| {
            prune(attempts, now, max_age);
            !attempts.is_empty()
        });
    }
}

fn prune(attempts: &mut Vec<Instant>, now: Instant, window: Duration) {
    if let Some(cutoff) = now.checked_sub(window) {
        attempts.retain(|t| *t > cutoff);
    }
}
