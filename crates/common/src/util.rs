//! Timestamp and size helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    }
}

/// Convert a byte count to megabytes (fractional).
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(10 * 1024 * 1024), 10.0);
        assert_eq!(bytes_to_mb(512 * 1024), 0.5);
    }

    #[test]
    fn test_unix_now_sane() {
        // after 2020-01-01
        assert!(unix_now() > 1_577_836_800);
    }
}
