pub mod itinerary;
pub mod user;

use chrono::{Datelike, SecondsFormat, TimeZone, Utc};

/// Current time as a fixed-width RFC 3339 string, so stored timestamps sort
/// lexically.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// First instant of the current UTC month, same format as [`now`].
pub fn month_start() -> String {
    let today = Utc::now();
    Utc.with_ymd_and_hms(today.year(), today.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(today)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Unix seconds (as sent by Stripe) to the stored timestamp format.
pub fn from_unix(secs: i64) -> Option<String> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
