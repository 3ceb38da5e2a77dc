//! Composite key derivation for the time-series store.
//!
//! A reading is addressed by a partition key scoping one device-day and a
//! sort key ordering records within that day:
//!
//! ```text
//! partition key:  device#<device_id>#<YYYY-MM-DD>   (UTC calendar day)
//! sort key:       sensor#<RFC3339, seconds precision, Z>
//! ```
//!
//! Keys are derived, never supplied by callers, and are recomputed from the
//! canonical timestamp on every write. Both are inverse-parseable; the sort
//! key format is fixed-width so lexicographic order equals chronological
//! order within a partition.

use chrono::{DateTime, NaiveDate, SecondsFormat, Timelike, Utc};

// ---

const PARTITION_PREFIX: &str = "device#";
const SORT_PREFIX: &str = "sensor#";

/// Partition key for the UTC calendar day of `timestamp`.
pub fn partition_key(device_id: &str, timestamp: DateTime<Utc>) -> String {
    partition_key_for_date(device_id, timestamp.date_naive())
}

pub fn partition_key_for_date(device_id: &str, date: NaiveDate) -> String {
    format!("{PARTITION_PREFIX}{}#{}", device_id, date.format("%Y-%m-%d"))
}

/// Sort key at seconds precision; sub-second digits are dropped, which is
/// what makes two same-second writes collide.
pub fn sort_key(timestamp: DateTime<Utc>) -> String {
    format!(
        "{SORT_PREFIX}{}",
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Extract `(device_id, date)` back out of a partition key.
///
/// Splits the date off the right-hand side, so device ids containing `#`
/// survive the round trip.
pub fn parse_partition_key(key: &str) -> Option<(&str, NaiveDate)> {
    // ---
    let rest = key.strip_prefix(PARTITION_PREFIX)?;
    let (device_id, date) = rest.rsplit_once('#')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((device_id, date))
}

/// Extract the second-truncated timestamp back out of a sort key.
pub fn parse_sort_key(key: &str) -> Option<DateTime<Utc>> {
    // ---
    let rest = key.strip_prefix(SORT_PREFIX)?;
    DateTime::parse_from_rfc3339(rest)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The canonical instant embedded in a reading's sort key.
pub fn truncate_to_second(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_partition_key_format() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 12).unwrap();
        assert_eq!(partition_key("dev-001", ts), "device#dev-001#2025-03-26");
    }

    #[test]
    fn test_sort_key_format() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 12).unwrap();
        assert_eq!(sort_key(ts), "sensor#2025-03-26T18:45:12Z");
    }

    #[test]
    fn test_round_trip_recovers_id_and_truncated_timestamp() {
        // ---
        let ts = Utc
            .with_ymd_and_hms(2025, 3, 26, 18, 45, 12)
            .unwrap()
            .with_nanosecond(987_000_000)
            .unwrap();

        let pk = partition_key("dev-001", ts);
        let (device_id, date) = parse_partition_key(&pk).unwrap();
        assert_eq!(device_id, "dev-001");
        assert_eq!(date, ts.date_naive());

        let parsed = parse_sort_key(&sort_key(ts)).unwrap();
        assert_eq!(parsed, truncate_to_second(ts));
        assert_eq!(parsed.nanosecond(), 0);
    }

    #[test]
    fn test_device_id_containing_separator_round_trips() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let key = partition_key("site#4#unit-9", ts);
        let (device_id, date) = parse_partition_key(&key).unwrap();
        assert_eq!(device_id, "site#4#unit-9");
        assert_eq!(date.to_string(), "2025-01-02");
    }

    #[test]
    fn test_sort_keys_order_chronologically() {
        // ---
        let earlier = Utc.with_ymd_and_hms(2025, 3, 26, 9, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 3, 26, 10, 0, 0).unwrap();
        assert!(sort_key(earlier) < sort_key(later));
    }

    #[test]
    fn test_malformed_keys_do_not_parse() {
        // ---
        assert!(parse_partition_key("reading#dev-001#2025-03-26").is_none());
        assert!(parse_partition_key("device#dev-001").is_none());
        assert!(parse_sort_key("sensor#not-a-timestamp").is_none());
        assert!(parse_sort_key("device#2025-03-26T18:45:12Z").is_none());
    }
}
