//! Milliseconds-since-epoch, the timestamp unit used at every storage
//! boundary across the workspace.

/// Current time as milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
