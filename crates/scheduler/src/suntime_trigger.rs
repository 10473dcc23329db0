use chrono::{DateTime, TimeZone, Timelike, Utc};
use habctl_domain::sun::SunCalculator;

use crate::time_trigger::TimeTrigger;
use crate::trigger::FireCallback;

/// §3 SuntimeTrigger (is-a TimeTrigger): fires at sunrise or sunset plus
/// a signed offset.
pub struct SuntimeTrigger {
    pub time: TimeTrigger,
    /// 1 = rise, 0 = set.
    pub sun_status: u8,
    /// Signed minutes applied to the rise/set epoch.
    pub offset: i32,
    pub lat: f64,
    pub lon: f64,
}

impl SuntimeTrigger {
    pub fn new(
        timezone: String,
        sun_status: u8,
        offset: i32,
        lat: f64,
        lon: f64,
        on_fire: FireCallback,
    ) -> Self {
        let mut time = TimeTrigger::new(timezone, -1, 0, on_fire);
        // Placeholder until the first recalculate(); an inactive trigger
        // never fires, so this is safe even if recalculate is delayed.
        time.core.active = false;
        Self {
            time,
            sun_status,
            offset,
            lat,
            lon,
        }
    }

    /// §4.1 SuntimeTrigger.recalculate contract.
    pub fn recalculate(&mut self, now_utc: DateTime<Utc>, sun: &dyn SunCalculator) -> bool {
        let riseset = sun.next_rise_set(now_utc.timestamp(), self.lat, self.lon);
        let epoch = match self.sun_status {
            1 => riseset.sunrise,
            _ => riseset.sunset,
        };

        let Some(epoch) = epoch else {
            let was_active = self.time.core.active;
            self.time.core.active = false;
            return was_active;
        };

        let adjusted = epoch + i64::from(self.offset) * 60;
        let Some(adjusted_dt) = DateTime::<Utc>::from_timestamp(adjusted, 0) else {
            let was_active = self.time.core.active;
            self.time.core.active = false;
            return was_active;
        };

        let today = now_utc.date_naive();
        let tomorrow = today + chrono::Duration::days(1);
        if adjusted_dt.date_naive() != today && adjusted_dt.date_naive() != tomorrow {
            let was_active = self.time.core.active;
            self.time.core.active = false;
            return was_active;
        }

        let new_hour = adjusted_dt.hour() as i32;
        let new_minute = adjusted_dt.minute();
        let changed = new_hour != self.time.core.hour
            || new_minute != self.time.core.minute
            || !self.time.core.active;

        self.time.core.hour = new_hour;
        self.time.core.minute = new_minute;
        self.time.core.active = true;
        changed
    }
}
