use chrono::{DateTime, Timelike, Utc};

use crate::trigger::{FireCallback, TriggerCore};
use crate::tz::{localize, parse_tz};

/// §3 TimeTrigger: a plain wall-clock trigger. `set_hour`/`set_minute`
/// are the user-configured local time; `core.hour`/`core.minute` are the
/// UTC-normalized bucket key derived from them.
pub struct TimeTrigger {
    pub core: TriggerCore,
    /// User-configured local hour, or -1 for "every hour".
    pub set_hour: i32,
    pub set_minute: u32,
}

impl TimeTrigger {
    pub fn new(timezone: String, set_hour: i32, set_minute: u32, on_fire: FireCallback) -> Self {
        let mut core = TriggerCore::new(timezone, on_fire);
        // "Every hour" triggers need no UTC conversion: the minute is
        // timezone-independent for any zone with a whole-hour offset,
        // which is the case this engine targets.
        if set_hour < 0 {
            core.hour = -1;
            core.minute = set_minute;
        }
        let mut t = Self {
            core,
            set_hour,
            set_minute,
        };
        if set_hour >= 0 {
            t.recalculate(Utc::now());
        }
        t
    }

    /// §4.1 TimeTrigger.recalculate contract: recompute the UTC hour of
    /// the user-set local hour for the soonest future occurrence. If the
    /// precomputed UTC hour already elapsed today, advance the anchor
    /// date by one day before localizing. This is a best-effort DST
    /// heuristic, not a from-scratch correct recurrence solver, and is
    /// kept intentionally simple rather than chasing every DST edge case.
    pub fn recalculate(&mut self, now_utc: DateTime<Utc>) -> bool {
        if self.set_hour < 0 {
            return false;
        }

        let tz = parse_tz(&self.core.timezone);
        let mut date = now_utc.with_timezone(&tz).date_naive();
        let mut utc_dt = localize(date, self.set_hour as u32, self.set_minute, tz);

        if now_utc.hour() as i32 > self.core.hour {
            date += chrono::Duration::days(1);
            utc_dt = localize(date, self.set_hour as u32, self.set_minute, tz);
        }

        let new_hour = utc_dt.hour() as i32;
        let new_minute = utc_dt.minute();
        let changed = new_hour != self.core.hour || new_minute != self.core.minute;
        self.core.hour = new_hour;
        self.core.minute = new_minute;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn noop() -> FireCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn every_hour_minute_passthrough() {
        let t = TimeTrigger::new("UTC".into(), -1, 15, noop());
        assert_eq!(t.core.hour, -1);
        assert_eq!(t.core.minute, 15);
    }

    #[test]
    fn utc_hour_matches_set_hour() {
        let t = TimeTrigger::new("UTC".into(), 10, 30, noop());
        assert_eq!(t.core.hour, 10);
        assert_eq!(t.core.minute, 30);
    }

    #[test]
    fn recalculate_rolls_forward_once_hour_elapsed() {
        let mut t = TimeTrigger::new("UTC".into(), 9, 0, noop());
        assert_eq!(t.core.hour, 9);
        // Now it's 10:00 UTC — 9:00 already passed today.
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let changed = t.recalculate(now);
        // Anchor rolls to tomorrow but the UTC hour/minute stay the same
        // (9:00 every day in UTC), so the bucket key itself is unchanged.
        assert!(!changed);
        assert_eq!(t.core.hour, 9);
    }

    #[test]
    fn timezone_offset_is_applied() {
        let t = TimeTrigger::new("America/New_York".into(), 9, 0, noop());
        // 9 AM EDT (UTC-4 in June) is 13:00 UTC.
        assert_eq!(t.core.hour, 13);
    }
}
