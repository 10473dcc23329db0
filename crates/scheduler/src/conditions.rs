use chrono::{DateTime, Datelike, Timelike, Utc};
use habctl_domain::sun::SunCalculator;

use crate::tz::parse_tz;

/// §4.2 Condition Evaluators (C5): stateless predicates. Each exposes
/// `validate(success, failure)` — exactly one of the two continuations
/// is invoked synchronously, matching the rule engine's own calling
/// convention rather than returning a bool the caller must branch on.
pub trait Condition: Send + Sync {
    fn validate(
        &self,
        now_utc: DateTime<Utc>,
        sun: &dyn SunCalculator,
        success: &mut dyn FnMut(),
        failure: &mut dyn FnMut(),
    );
}

/// §3 TimeCondition.
pub struct TimeCondition {
    pub from_hour: Option<u32>,
    pub from_minute: Option<u32>,
    pub to_hour: Option<u32>,
    pub to_minute: Option<u32>,
    pub timezone: String,
}

impl Condition for TimeCondition {
    fn validate(
        &self,
        now_utc: DateTime<Utc>,
        _sun: &dyn SunCalculator,
        success: &mut dyn FnMut(),
        failure: &mut dyn FnMut(),
    ) {
        let (Some(fh), Some(fm), Some(th), Some(tm)) =
            (self.from_hour, self.from_minute, self.to_hour, self.to_minute)
        else {
            failure();
            return;
        };

        let tz = parse_tz(&self.timezone);
        let local = now_utc.with_timezone(&tz);
        let now_minutes = local.hour() * 60 + local.minute();
        let from = fh * 60 + fm;
        let to = th * 60 + tm;

        let matches = if from <= to {
            now_minutes >= from && now_minutes <= to
        } else {
            now_minutes >= from || now_minutes <= to
        };

        if matches {
            success();
        } else {
            failure();
        }
    }
}

/// §3 WeekdayCondition. Monday=1 .. Sunday=7, evaluated in local time.
pub struct WeekdayCondition {
    pub weekdays: Option<String>,
    pub timezone: String,
}

impl Condition for WeekdayCondition {
    fn validate(
        &self,
        now_utc: DateTime<Utc>,
        _sun: &dyn SunCalculator,
        success: &mut dyn FnMut(),
        failure: &mut dyn FnMut(),
    ) {
        let Some(weekdays) = &self.weekdays else {
            failure();
            return;
        };

        let tz = parse_tz(&self.timezone);
        let local = now_utc.with_timezone(&tz);
        let iso_weekday = local.weekday().number_from_monday().to_string();

        if weekdays.contains(iso_weekday.as_str()) {
            success();
        } else {
            failure();
        }
    }
}

/// §3 SuntimeCondition.
pub struct SuntimeCondition {
    /// Target status to match: 1 = day, 0 = night.
    pub sun_status: Option<u8>,
    pub sunrise_offset: i32,
    pub sunset_offset: i32,
    pub lat: f64,
    pub lon: f64,
}

impl Condition for SuntimeCondition {
    fn validate(
        &self,
        now_utc: DateTime<Utc>,
        sun: &dyn SunCalculator,
        success: &mut dyn FnMut(),
        failure: &mut dyn FnMut(),
    ) {
        let Some(target) = self.sun_status else {
            failure();
            return;
        };

        let now_epoch = now_utc.timestamp();
        let riseset = sun.riseset(now_epoch, self.lat, self.lon);

        let current_status = match (riseset.sunrise, riseset.sunset) {
            (Some(sr), Some(ss)) => {
                let adj_sr = sr + i64::from(self.sunrise_offset) * 60;
                let adj_ss = ss + i64::from(self.sunset_offset) * 60;
                u8::from(now_epoch >= adj_sr && now_epoch <= adj_ss)
            }
            (Some(sr), None) => {
                u8::from(now_epoch >= sr + i64::from(self.sunrise_offset) * 60)
            }
            (None, Some(ss)) => {
                u8::from(now_epoch <= ss + i64::from(self.sunset_offset) * 60)
            }
            (None, None) => {
                // Polar fallback: no rise/set today in either direction.
                // Compare against the next occurrence, applying
                // `sunrise_offset` to *both* sides — preserved as-is per
                // the open question, not a bug to fix.
                let next = sun.next_rise_set(now_epoch, self.lat, self.lon);
                match (next.sunrise, next.sunset) {
                    (Some(sr), Some(ss)) => {
                        let adj_sr = sr + i64::from(self.sunrise_offset) * 60;
                        let adj_ss = ss + i64::from(self.sunrise_offset) * 60;
                        u8::from(now_epoch >= adj_sr && now_epoch <= adj_ss)
                    }
                    (Some(sr), None) => {
                        u8::from(now_epoch >= sr + i64::from(self.sunrise_offset) * 60)
                    }
                    (None, Some(ss)) => {
                        u8::from(now_epoch <= ss + i64::from(self.sunrise_offset) * 60)
                    }
                    (None, None) => 0,
                }
            }
        };

        if current_status == target {
            success();
        } else {
            failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use habctl_domain::sun::RiseSet;

    struct NullSun;
    impl SunCalculator for NullSun {
        fn next_rise_set(&self, _e: i64, _lat: f64, _lon: f64) -> RiseSet {
            RiseSet::default()
        }
        fn riseset(&self, _e: i64, _lat: f64, _lon: f64) -> RiseSet {
            RiseSet::default()
        }
    }

    fn assert_success(cond: &dyn Condition, now: DateTime<Utc>, sun: &dyn SunCalculator) {
        let mut ok = false;
        cond.validate(now, sun, &mut || ok = true, &mut || ok = false);
        assert!(ok, "expected success");
    }

    fn assert_failure(cond: &dyn Condition, now: DateTime<Utc>, sun: &dyn SunCalculator) {
        let mut ok = true;
        cond.validate(now, sun, &mut || ok = true, &mut || ok = false);
        assert!(!ok, "expected failure");
    }

    #[test]
    fn midnight_wrapping_time_condition() {
        let cond = TimeCondition {
            from_hour: Some(22),
            from_minute: Some(0),
            to_hour: Some(6),
            to_minute: Some(0),
            timezone: "UTC".into(),
        };
        let sun = NullSun;
        assert_success(&cond, Utc.with_ymd_and_hms(2024, 6, 15, 23, 0, 0).unwrap(), &sun);
        assert_success(&cond, Utc.with_ymd_and_hms(2024, 6, 15, 3, 0, 0).unwrap(), &sun);
        assert_failure(&cond, Utc.with_ymd_and_hms(2024, 6, 15, 7, 0, 0).unwrap(), &sun);
        assert_failure(&cond, Utc.with_ymd_and_hms(2024, 6, 15, 21, 0, 0).unwrap(), &sun);
    }

    #[test]
    fn unset_time_condition_fails() {
        let cond = TimeCondition {
            from_hour: None,
            from_minute: None,
            to_hour: None,
            to_minute: None,
            timezone: "UTC".into(),
        };
        assert_failure(&cond, Utc::now(), &NullSun);
    }

    #[test]
    fn weekday_match() {
        let cond = WeekdayCondition {
            weekdays: Some("135".into()),
            timezone: "UTC".into(),
        };
        let sun = NullSun;
        // 2024-06-17 is a Monday.
        assert_success(&cond, Utc.with_ymd_and_hms(2024, 6, 17, 12, 0, 0).unwrap(), &sun);
        // Wednesday.
        assert_success(&cond, Utc.with_ymd_and_hms(2024, 6, 19, 12, 0, 0).unwrap(), &sun);
        // Friday.
        assert_success(&cond, Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap(), &sun);
        // Tuesday should fail.
        assert_failure(&cond, Utc.with_ymd_and_hms(2024, 6, 18, 12, 0, 0).unwrap(), &sun);
    }

    #[test]
    fn suntime_condition_day_match() {
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        struct Stub;
        impl SunCalculator for Stub {
            fn next_rise_set(&self, _e: i64, _lat: f64, _lon: f64) -> RiseSet {
                RiseSet::default()
            }
            fn riseset(&self, e: i64, _lat: f64, _lon: f64) -> RiseSet {
                RiseSet {
                    sunrise: Some(e - 4 * 3600),
                    sunset: Some(e + 4 * 3600),
                }
            }
        }
        let cond = SuntimeCondition {
            sun_status: Some(1),
            sunrise_offset: 0,
            sunset_offset: 0,
            lat: 55.7,
            lon: 13.2,
        };
        assert_success(&cond, now, &Stub);
    }
}
