//! Timestamp utilities

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as an ISO-8601 string, the format stamped on every record
pub fn now_iso8601() -> String {
    now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Local wall-clock stamp used in session file names (`YYYYMMDD_HHMMSS`)
pub fn session_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}
