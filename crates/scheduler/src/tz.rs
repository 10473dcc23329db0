//! Timezone helpers shared by the trigger kinds' `recalculate` methods.

use chrono::{DateTime, LocalResult, NaiveDate, TimeZone, Utc};

/// Parse an IANA timezone name, falling back to UTC for an unrecognized
/// or empty string (mirrors the settings store's own "missing ⇒ UTC"
/// default).
pub fn parse_tz(tz: &str) -> chrono_tz::Tz {
    tz.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC)
}

/// Localize `date` at `hour:minute:00` in `tz` and convert to UTC.
///
/// DST gaps (the local time doesn't exist) are resolved by walking
/// forward minute by minute until a valid local time is found, capped at
/// 24 hours; DST overlaps (the local time is ambiguous) resolve to the
/// earlier of the two mappings — the same policy the cron evaluator uses
/// for its own next-occurrence search.
pub fn localize(date: NaiveDate, hour: u32, minute: u32, tz: chrono_tz::Tz) -> DateTime<Utc> {
    let mut naive = date
        .and_hms_opt(hour % 24, minute, 0)
        .unwrap_or_else(|| date.and_hms_opt(0, 0, 0).unwrap());

    for _ in 0..24 * 60 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => {
                naive += chrono::Duration::minutes(1);
            }
        }
    }
    // Unreachable in practice — every naive datetime resolves within a day.
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        .with_timezone(&Utc)
}
