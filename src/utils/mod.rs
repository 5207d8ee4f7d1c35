//! This module aggregates various utility submodules used throughout the application.

/// Utilities for interacting with the application's SQLite database.
pub mod database;

/// Formats a duration in milliseconds as `m:ss`, or `h:mm:ss` past the hour.
pub fn format_duration(millis: u64) -> String {
    let total_seconds = millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "0:00")]
    #[test_case(61_000, "1:01")]
    #[test_case(3_600_000, "1:00:00")]
    #[test_case(3_725_999, "1:02:05")]
    fn test_format_duration(millis: u64, expected: &str) {
        assert_eq!(format_duration(millis), expected);
    }
}
