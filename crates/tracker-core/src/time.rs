use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamps are stored as RFC3339 with millisecond precision and a `Z`
/// suffix. One fixed shape means stored strings compare lexicographically
/// in the same order as their instants, which the store's range filters
/// and ORDER BY clauses rely on.
pub fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current instant in the canonical storage format.
pub fn now_ts() -> String {
    fmt_ts(Utc::now())
}

/// Parse any RFC3339 timestamp (callers may send offsets other than Z).
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
