//! Utility functions and helpers.

pub mod http;

use chrono::{DateTime, Utc};

/// Timestamp format stamped on exported records.
pub const RECORD_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used in backup and metrics file names.
pub const FILE_STAMP: &str = "%Y%m%d_%H%M%S";

/// Format a UTC instant the way records carry it.
pub fn record_timestamp(at: DateTime<Utc>) -> String {
    at.format(RECORD_TIMESTAMP).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_record_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 1, 22, 6, 5, 9).unwrap();
        assert_eq!(record_timestamp(at), "2026-01-22 06:05:09");
        assert_eq!(at.format(FILE_STAMP).to_string(), "20260122_060509");
    }
}
