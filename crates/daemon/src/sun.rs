//! C1 Sun Calculator (§6): the assumed external rise/set library, backed
//! here by the `sunrise` crate the way `Azkarell-hyprsunrisewatcher`'s
//! scheduler computes its dawn/dusk intervals (`Coordinates` +
//! `SolarDay::event_time`).

use chrono::{DateTime, Days, NaiveDate, Utc};
use habctl_domain::sun::{RiseSet, SunCalculator};
use sunrise::{Coordinates, SolarDay, SolarEvent};

/// `sunrise`-crate-backed [`SunCalculator`]. Polar day/night (sun never
/// crosses the horizon) isn't reported by `event_time` as an `Option` the
/// way §6's contract wants, so it's detected heuristically: a day whose
/// computed sunrise and sunset coincide within a minute is treated as "no
/// rise/set today", matching how a fixed-point solver degenerates at the
/// poles.
pub struct SunriseCrateSunCalculator;

const DEGENERATE_THRESHOLD_SECS: i64 = 60;

fn riseset_for_date(coords: Coordinates, date: NaiveDate) -> RiseSet {
    let day = SolarDay::new(coords, date);
    let sunrise = day.event_time(SolarEvent::Sunrise);
    let sunset = day.event_time(SolarEvent::Sunset);

    if (sunset - sunrise).num_seconds().abs() < DEGENERATE_THRESHOLD_SECS {
        return RiseSet {
            sunrise: None,
            sunset: None,
        };
    }

    RiseSet {
        sunrise: Some(sunrise.timestamp()),
        sunset: Some(sunset.timestamp()),
    }
}

impl SunCalculator for SunriseCrateSunCalculator {
    fn next_rise_set(&self, utc_epoch_secs: i64, lat: f64, lon: f64) -> RiseSet {
        let Some(coords) = Coordinates::new(lat, lon) else {
            return RiseSet::default();
        };
        let Some(now) = DateTime::<Utc>::from_timestamp(utc_epoch_secs, 0) else {
            return RiseSet::default();
        };
        let Some(tomorrow_date) = now.checked_add_days(Days::new(1)).map(|d| d.date_naive()) else {
            return RiseSet::default();
        };

        let today = riseset_for_date(coords, now.date_naive());
        let tomorrow = riseset_for_date(coords, tomorrow_date);

        // Each side independently rolls to tomorrow if today's already
        // elapsed — mirrors `SuntimeTrigger.recalculate` being free to
        // pick up a sunrise or a sunset from whichever of the two days
        // hasn't happened yet.
        let sunrise = match today.sunrise {
            Some(s) if s > utc_epoch_secs => Some(s),
            _ => tomorrow.sunrise,
        };
        let sunset = match today.sunset {
            Some(s) if s > utc_epoch_secs => Some(s),
            _ => tomorrow.sunset,
        };

        RiseSet { sunrise, sunset }
    }

    fn riseset(&self, utc_epoch_secs: i64, lat: f64, lon: f64) -> RiseSet {
        let Some(coords) = Coordinates::new(lat, lon) else {
            return RiseSet::default();
        };
        let Some(now) = DateTime::<Utc>::from_timestamp(utc_epoch_secs, 0) else {
            return RiseSet::default();
        };
        riseset_for_date(coords, now.date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn lund_midsummer_has_a_sunrise_and_sunset() {
        let calc = SunriseCrateSunCalculator;
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap();
        let rs = calc.riseset(now.timestamp(), 55.699592, 13.187836);
        assert!(rs.sunrise.is_some());
        assert!(rs.sunset.is_some());
        assert!(rs.sunrise.unwrap() < rs.sunset.unwrap());
    }

    #[test]
    fn next_rise_set_is_strictly_after_now() {
        let calc = SunriseCrateSunCalculator;
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        let rs = calc.next_rise_set(now.timestamp(), 55.699592, 13.187836);
        if let Some(sunrise) = rs.sunrise {
            assert!(sunrise > now.timestamp());
        }
    }
}
