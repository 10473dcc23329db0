use chrono::{DateTime, Utc};
use habctl_domain::device::{DeviceManager, Scale, SensorType};

use crate::time_trigger::TimeTrigger;
use crate::trigger::FireCallback;

/// §3 BlockheaterTrigger (is-a TimeTrigger): a pre-warm trigger computed
/// backward from a departure time and the last observed temperature.
pub struct BlockheaterTrigger {
    pub time: TimeTrigger,
    pub departure_hour: u32,
    pub departure_minute: u32,
    pub sensor_id: String,
    pub temp: Option<f64>,
}

impl BlockheaterTrigger {
    pub fn new(
        timezone: String,
        departure_hour: u32,
        departure_minute: u32,
        sensor_id: String,
        on_fire: FireCallback,
    ) -> Self {
        let mut time = TimeTrigger::new(timezone, -1, 0, on_fire);
        time.core.active = false;
        Self {
            time,
            departure_hour,
            departure_minute,
            sensor_id,
            temp: None,
        }
    }

    /// Empirical warm-up offset in minutes, clamped to <= 120. This is an
    /// application invariant, not a tuning knob — do not retune it.
    pub fn offset_minutes(temp: f64) -> i64 {
        let raw = 60.0 + 100.0 * temp / (temp - 35.0);
        std::cmp::min(120, raw.round() as i64)
    }

    /// §4.1 BlockheaterTrigger.recalculate contract: requires a known
    /// temperature from the device manager; above 10 degC disables,
    /// otherwise computes the offset and delegates to
    /// `TimeTrigger::recalculate` with the back-derived hour/minute.
    pub fn recalculate(&mut self, now_utc: DateTime<Utc>, devices: &dyn DeviceManager) -> bool {
        let temp = devices
            .device(&self.sensor_id)
            .and_then(|d| d.sensor_value(SensorType::Temperature, Scale::Celsius));

        self.temp = temp;

        let Some(temp) = temp else {
            let was_active = self.time.core.active;
            self.time.core.active = false;
            return was_active;
        };

        if temp > 10.0 {
            let was_active = self.time.core.active;
            self.time.core.active = false;
            return was_active;
        }

        let offset = Self::offset_minutes(temp);
        let departure_minutes = (self.departure_hour * 60 + self.departure_minute) as i64;
        let minute_of_day = (departure_minutes - offset).rem_euclid(1440);

        self.time.set_hour = (minute_of_day / 60) as i32;
        self.time.set_minute = (minute_of_day % 60) as u32;
        self.time.core.active = true;

        self.time.recalculate(now_utc)
    }

    /// Feed a fresh sensor reading without waiting for the next tick
    /// (§4.3 `sensorValueUpdated` routing).
    pub fn set_temp(&mut self, temp: f64, now_utc: DateTime<Utc>) -> bool {
        self.temp = Some(temp);
        if temp > 10.0 {
            let was_active = self.time.core.active;
            self.time.core.active = false;
            return was_active;
        }
        let offset = Self::offset_minutes(temp);
        let departure_minutes = (self.departure_hour * 60 + self.departure_minute) as i64;
        let minute_of_day = (departure_minutes - offset).rem_euclid(1440);
        self.time.set_hour = (minute_of_day / 60) as i32;
        self.time.set_minute = (minute_of_day % 60) as u32;
        self.time.core.active = true;
        self.time.recalculate(now_utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    struct StubDevice {
        temp: Mutex<Option<f64>>,
    }

    impl habctl_domain::device::Device for StubDevice {
        fn sensor_value(&self, _t: SensorType, _s: Scale) -> Option<f64> {
            *self.temp.lock().unwrap()
        }
    }

    struct StubDevices {
        dev: Arc<StubDevice>,
        id: String,
    }

    impl DeviceManager for StubDevices {
        fn device(&self, id: &str) -> Option<Arc<dyn habctl_domain::device::Device>> {
            if id == self.id {
                Some(self.dev.clone() as Arc<dyn habctl_domain::device::Device>)
            } else {
                None
            }
        }
    }

    fn noop() -> FireCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn offset_formula_matches_invariant() {
        // round(60 + 100*(-10)/(-10-35)) = round(60 + 100*(-10)/(-45)) = round(60+22.22) = 82
        assert_eq!(BlockheaterTrigger::offset_minutes(-10.0), 82);
    }

    #[test]
    fn offset_clamped_to_120() {
        assert!(BlockheaterTrigger::offset_minutes(-34.9) <= 120);
    }

    #[test]
    fn inactive_above_threshold() {
        let dev = Arc::new(StubDevice {
            temp: Mutex::new(Some(11.0)),
        });
        let devices = StubDevices {
            dev,
            id: "42".into(),
        };
        let mut t = BlockheaterTrigger::new("UTC".into(), 7, 30, "42".into(), noop());
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        t.recalculate(now, &devices);
        assert!(!t.time.core.active);
    }

    #[test]
    fn active_at_threshold() {
        let dev = Arc::new(StubDevice {
            temp: Mutex::new(Some(10.0)),
        });
        let devices = StubDevices {
            dev,
            id: "42".into(),
        };
        let mut t = BlockheaterTrigger::new("UTC".into(), 7, 30, "42".into(), noop());
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        t.recalculate(now, &devices);
        assert!(t.time.core.active);
    }

    #[test]
    fn scenario_s3_minus_10_departure_0730() {
        let dev = Arc::new(StubDevice {
            temp: Mutex::new(Some(-10.0)),
        });
        let devices = StubDevices {
            dev,
            id: "42".into(),
        };
        let mut t = BlockheaterTrigger::new("UTC".into(), 7, 30, "42".into(), noop());
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        t.recalculate(now, &devices);
        // 450 - 82 = 368 -> 06:08
        assert_eq!(t.time.set_hour, 6);
        assert_eq!(t.time.set_minute, 8);
    }

    #[test]
    fn unreadable_sensor_stays_inactive() {
        let dev = Arc::new(StubDevice {
            temp: Mutex::new(None),
        });
        let devices = StubDevices {
            dev,
            id: "42".into(),
        };
        let mut t = BlockheaterTrigger::new("UTC".into(), 7, 30, "42".into(), noop());
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let changed = t.recalculate(now, &devices);
        assert!(!changed);
        assert!(!t.time.core.active);
    }
}
