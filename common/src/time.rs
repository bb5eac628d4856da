use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch. Returns 0 if the clock is before 1970.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
