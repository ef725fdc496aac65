use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// No monotonic guarantees are made here on purpose: the engine's TTL semantics are defined
/// against wall-clock time, so a clock step can legitimately expire a record early or late.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as i64
}
