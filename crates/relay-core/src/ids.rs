//! Request identifiers and timestamps

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generate a `chatcmpl-` response identifier
///
/// Millisecond timestamp plus a process-local counter; unique enough for
/// correlating responses in logs without pulling in a uuid dependency.
pub fn completion_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("chatcmpl-{now:x}{count:04x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_ids_are_unique() {
        let a = completion_id();
        let b = completion_id();
        assert_ne!(a, b);
        assert!(a.starts_with("chatcmpl-"));
    }
}
