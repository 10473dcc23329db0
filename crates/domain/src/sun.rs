//! Astronomical rise/set boundary (assumed external library per the
//! controller's own spec — modeled here as the trait surface consumed by
//! `SuntimeTrigger`/`SuntimeCondition`).

/// Sunrise/sunset epochs for a single UTC day. Either side may be absent
/// at the poles (polar night/day).
#[derive(Debug, Clone, Copy, Default)]
pub struct RiseSet {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

pub trait SunCalculator: Send + Sync {
    /// The first rise/set pair (today's or tomorrow's, whichever is next)
    /// strictly after `utc_epoch_secs`.
    fn next_rise_set(&self, utc_epoch_secs: i64, lat: f64, lon: f64) -> RiseSet;

    /// Rise/set for the same UTC calendar day as `utc_epoch_secs`.
    fn riseset(&self, utc_epoch_secs: i64, lat: f64, lon: f64) -> RiseSet;
}
