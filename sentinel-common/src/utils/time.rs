use chrono::Utc;

/// Returns the current UNIX timestamp in milliseconds.
///
/// Used to stamp signature proposals and blacklist entries.
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_non_zero() {
        let timestamp = current_time_millis();
        assert!(timestamp > 0, "Timestamp should be greater than zero");
    }

    #[test]
    fn test_current_time_monotonic() {
        let t1 = current_time_millis();
        let t2 = current_time_millis();
        // May be equal when both calls land in the same millisecond
        assert!(t2 >= t1, "Second timestamp should be greater than or equal to the first");
    }
}
