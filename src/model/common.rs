use chrono::Utc;

pub type Id = String;

/// Milliseconds since the Unix epoch, as stored in `lastModified`.
pub type Timestamp = i64;

/// Longest `id` or `documentGuid` the store accepts.
pub const MAX_KEY_LEN: usize = 256;

pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

/// Next `lastModified` for a record whose previous stamp was `previous`.
///
/// The result is never behind the clock and always strictly greater than the
/// previous stamp, so two writes landing in the same millisecond still order.
pub fn next_modified(previous: Option<Timestamp>, now: Timestamp) -> Timestamp {
    match previous {
        Some(prev) if prev >= now => prev + 1,
        _ => now.max(1),
    }
}
