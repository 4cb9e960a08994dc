//! Freshness evaluation.
//!
//! Every stored entry carries an `x-last-refresh` header holding the
//! decimal millisecond Unix timestamp of its last successful refresh. An
//! entry older than [`FRESHNESS_WINDOW`] is stale; a missing or malformed
//! timestamp degrades to "maximally stale", never to a failure.

use std::time::Duration;

use axum::http::HeaderName;
use time::OffsetDateTime;

use super::store::CachedEntry;

/// Reserved metadata header stamped into every stored entry.
pub const LAST_REFRESH: HeaderName = HeaderName::from_static("x-last-refresh");

/// Fixed staleness threshold. Deliberately not configurable.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Verdict of a freshness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Evaluate a stored entry against the freshness window at `now_ms`.
///
/// Never errors: an absent or non-numeric `x-last-refresh` header is
/// treated as timestamp 0, which always falls outside the window.
pub fn evaluate(entry: &CachedEntry, now_ms: u64) -> Freshness {
    match entry.last_refresh_ms() {
        Some(last_refresh) if now_ms.saturating_sub(last_refresh) <= window_ms() => {
            Freshness::Fresh
        }
        _ => Freshness::Stale,
    }
}

/// Current wall-clock time as a millisecond Unix timestamp.
pub fn now_unix_ms() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000) as u64
}

fn window_ms() -> u64 {
    FRESHNESS_WINDOW.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use bytes::Bytes;

    fn entry_with_header(value: Option<&str>) -> CachedEntry {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(LAST_REFRESH, HeaderValue::from_str(value).unwrap());
        }
        CachedEntry::new(StatusCode::OK, &headers, Bytes::from_static(b"body"))
    }

    #[test]
    fn entry_within_window_is_fresh() {
        let now = now_unix_ms();
        let entry = entry_with_header(Some(&now.to_string()));
        assert_eq!(evaluate(&entry, now), Freshness::Fresh);

        let just_inside = now - (29 * 60 * 1000);
        let entry = entry_with_header(Some(&just_inside.to_string()));
        assert_eq!(evaluate(&entry, now), Freshness::Fresh);
    }

    #[test]
    fn entry_at_the_window_boundary_is_fresh() {
        let now = now_unix_ms();
        let boundary = now - (30 * 60 * 1000);
        let entry = entry_with_header(Some(&boundary.to_string()));
        assert_eq!(evaluate(&entry, now), Freshness::Fresh);
    }

    #[test]
    fn entry_past_the_window_is_stale() {
        let now = now_unix_ms();
        let expired = now - (31 * 60 * 1000);
        let entry = entry_with_header(Some(&expired.to_string()));
        assert_eq!(evaluate(&entry, now), Freshness::Stale);
    }

    #[test]
    fn missing_timestamp_is_stale() {
        let entry = entry_with_header(None);
        assert_eq!(evaluate(&entry, now_unix_ms()), Freshness::Stale);
    }

    #[test]
    fn malformed_timestamp_degrades_to_stale() {
        for malformed in ["not-a-number", "", "12.5", "-3"] {
            let entry = entry_with_header(Some(malformed));
            assert_eq!(
                evaluate(&entry, now_unix_ms()),
                Freshness::Stale,
                "timestamp {malformed:?} should degrade to stale"
            );
        }
    }

    #[test]
    fn future_timestamp_is_fresh() {
        let now = now_unix_ms();
        let future = now + 60_000;
        let entry = entry_with_header(Some(&future.to_string()));
        assert_eq!(evaluate(&entry, now), Freshness::Fresh);
    }
}
