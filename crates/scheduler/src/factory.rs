use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::blockheater_trigger::BlockheaterTrigger;
use crate::conditions::{Condition, SuntimeCondition, TimeCondition, WeekdayCondition};
use crate::index::TriggerHandle;
use crate::manager::TriggerManager;
use crate::suntime_trigger::SuntimeTrigger;
use crate::time_trigger::TimeTrigger;
use crate::trigger::{FireCallback, Trigger};

/// Accumulates one event's parameters across repeated `parse_param` calls
/// before the caller (the rule-definition loader, out of scope here) asks
/// for the finished trigger or condition. Mirrors the incremental
/// construction style described for the scheduler's event factory: the
/// loader feeds key/value pairs as it encounters them, not all at once.
pub enum EventBuilder {
    Time {
        hour: Option<i32>,
        minute: Option<u32>,
    },
    Suntime {
        sun_status: Option<u8>,
        offset: Option<i32>,
        lat: Option<f64>,
        lon: Option<f64>,
    },
    Blockheater {
        departure_hour: Option<u32>,
        departure_minute: Option<u32>,
        sensor_id: Option<String>,
    },
    Weekdays {
        weekdays: Option<String>,
    },
    TimeCondition {
        from_hour: Option<u32>,
        from_minute: Option<u32>,
        to_hour: Option<u32>,
        to_minute: Option<u32>,
    },
    SuntimeCondition {
        sun_status: Option<u8>,
        sunrise_offset: Option<i32>,
        sunset_offset: Option<i32>,
        lat: Option<f64>,
        lon: Option<f64>,
    },
}

impl EventBuilder {
    pub fn parse_param(&mut self, key: &str, value: &str) {
        match self {
            EventBuilder::Time { hour, minute } => match key {
                "hour" => *hour = value.parse().ok(),
                "minute" => *minute = value.parse().ok(),
                _ => {}
            },
            EventBuilder::Suntime {
                sun_status,
                offset,
                lat,
                lon,
            } => match key {
                "sunStatus" => *sun_status = value.parse().ok(),
                "offset" => *offset = value.parse().ok(),
                "latitude" => *lat = value.parse().ok(),
                "longitude" => *lon = value.parse().ok(),
                _ => {}
            },
            EventBuilder::Blockheater {
                departure_hour,
                departure_minute,
                sensor_id,
            } => match key {
                "hour" => *departure_hour = value.parse().ok(),
                "minute" => *departure_minute = value.parse().ok(),
                "clientSensorId" => *sensor_id = Some(value.to_string()),
                _ => {}
            },
            EventBuilder::Weekdays { weekdays } => {
                if key == "weekdays" {
                    *weekdays = Some(value.to_string());
                }
            }
            EventBuilder::TimeCondition {
                from_hour,
                from_minute,
                to_hour,
                to_minute,
            } => match key {
                "fromHour" => *from_hour = value.parse().ok(),
                "fromMinute" => *from_minute = value.parse().ok(),
                "toHour" => *to_hour = value.parse().ok(),
                "toMinute" => *to_minute = value.parse().ok(),
                _ => {}
            },
            EventBuilder::SuntimeCondition {
                sun_status,
                sunrise_offset,
                sunset_offset,
                lat,
                lon,
            } => match key {
                "sunStatus" => *sun_status = value.parse().ok(),
                "sunriseOffset" => *sunrise_offset = value.parse().ok(),
                "sunsetOffset" => *sunset_offset = value.parse().ok(),
                "latitude" => *lat = value.parse().ok(),
                "longitude" => *lon = value.parse().ok(),
                _ => {}
            },
        }
    }

    /// Finish as a trigger. `None` if this builder describes a condition.
    pub fn finish_trigger(self, timezone: String, on_fire: FireCallback) -> Option<Trigger> {
        match self {
            EventBuilder::Time { hour, minute } => Some(Trigger::Time(TimeTrigger::new(
                timezone,
                hour.unwrap_or(-1),
                minute.unwrap_or(0),
                on_fire,
            ))),
            EventBuilder::Suntime {
                sun_status,
                offset,
                lat,
                lon,
            } => Some(Trigger::Suntime(SuntimeTrigger::new(
                timezone,
                sun_status.unwrap_or(1),
                offset.unwrap_or(0),
                lat.unwrap_or(0.0),
                lon.unwrap_or(0.0),
                on_fire,
            ))),
            EventBuilder::Blockheater {
                departure_hour,
                departure_minute,
                sensor_id,
            } => Some(Trigger::Blockheater(BlockheaterTrigger::new(
                timezone,
                departure_hour.unwrap_or(0),
                departure_minute.unwrap_or(0),
                sensor_id.unwrap_or_default(),
                on_fire,
            ))),
            _ => None,
        }
    }

    /// Finish as a condition. `None` if this builder describes a trigger.
    pub fn finish_condition(self, timezone: String) -> Option<Box<dyn Condition>> {
        match self {
            EventBuilder::Weekdays { weekdays } => {
                Some(Box::new(WeekdayCondition { weekdays, timezone }))
            }
            EventBuilder::TimeCondition {
                from_hour,
                from_minute,
                to_hour,
                to_minute,
            } => Some(Box::new(TimeCondition {
                from_hour,
                from_minute,
                to_hour,
                to_minute,
                timezone,
            })),
            EventBuilder::SuntimeCondition {
                sun_status,
                sunrise_offset,
                sunset_offset,
                lat,
                lon,
            } => Some(Box::new(SuntimeCondition {
                sun_status,
                sunrise_offset: sunrise_offset.unwrap_or(0),
                sunset_offset: sunset_offset.unwrap_or(0),
                lat: lat.unwrap_or(0.0),
                lon: lon.unwrap_or(0.0),
            })),
            _ => None,
        }
    }
}

/// §4.3 Event Factory (C6): dispatches on a type string to the builder
/// for that trigger or condition, and keeps a side list of block-heater
/// triggers so sensor pushes can reach them without scanning the whole
/// index.
#[derive(Default)]
pub struct EventFactory {
    blockheater_handles: Mutex<Vec<(String, TriggerHandle)>>,
}

impl EventFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building an event by its declared type name.
    pub fn builder(type_name: &str) -> Option<EventBuilder> {
        match type_name {
            "time" => Some(EventBuilder::Time {
                hour: None,
                minute: None,
            }),
            "suntime" => Some(EventBuilder::Suntime {
                sun_status: None,
                offset: None,
                lat: None,
                lon: None,
            }),
            "blockheater" => Some(EventBuilder::Blockheater {
                departure_hour: None,
                departure_minute: None,
                sensor_id: None,
            }),
            "weekdays" => Some(EventBuilder::Weekdays { weekdays: None }),
            "timeCondition" => Some(EventBuilder::TimeCondition {
                from_hour: None,
                from_minute: None,
                to_hour: None,
                to_minute: None,
            }),
            "suntimeCondition" => Some(EventBuilder::SuntimeCondition {
                sun_status: None,
                sunrise_offset: None,
                sunset_offset: None,
                lat: None,
                lon: None,
            }),
            _ => None,
        }
    }

    /// Register a freshly built trigger with the manager, tracking
    /// block-heater triggers in the sensor-routing side list.
    pub fn register(&self, manager: &TriggerManager, sensor_id: Option<String>, trigger: Trigger) -> TriggerHandle {
        let handle = manager.add(trigger);
        if let Some(sensor_id) = sensor_id {
            self.blockheater_handles.lock().push((sensor_id, handle.clone()));
        }
        handle
    }

    /// §4.3 `sensorValueUpdated`: push a fresh reading straight to every
    /// block-heater trigger watching that sensor, bypassing the next
    /// tick's device-manager poll.
    pub fn sensor_value_updated(&self, manager: &TriggerManager, sensor_id: &str, temp: f64, now_utc: DateTime<Utc>) {
        let handles: Vec<TriggerHandle> = self
            .blockheater_handles
            .lock()
            .iter()
            .filter(|(id, _)| id == sensor_id)
            .map(|(_, h)| h.clone())
            .collect();

        for handle in handles {
            let changed = {
                let mut trig = handle.lock();
                match &mut *trig {
                    Trigger::Blockheater(bh) => bh.set_temp(temp, now_utc),
                    _ => false,
                }
            };
            if changed {
                let active = handle.lock().active();
                if active {
                    manager.relocate(&handle);
                } else {
                    manager.delete(&handle);
                }
            }
        }
    }

    /// §4.3 `clearAll()`.
    pub fn clear_all(&self, manager: &TriggerManager) {
        manager.clear_all();
        self.blockheater_handles.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use habctl_domain::device::DeviceManager;
    use habctl_domain::sun::{RiseSet, SunCalculator};

    struct NullSun;
    impl SunCalculator for NullSun {
        fn next_rise_set(&self, _e: i64, _lat: f64, _lon: f64) -> RiseSet {
            RiseSet::default()
        }
        fn riseset(&self, _e: i64, _lat: f64, _lon: f64) -> RiseSet {
            RiseSet::default()
        }
    }
    struct NullDevices;
    impl DeviceManager for NullDevices {
        fn device(&self, _id: &str) -> Option<Arc<dyn habctl_domain::device::Device>> {
            None
        }
    }

    #[test]
    fn incremental_time_trigger_build() {
        let mut b = EventFactory::builder("time").unwrap();
        b.parse_param("hour", "7");
        b.parse_param("minute", "45");
        let t = b.finish_trigger("UTC".into(), Arc::new(|_| {})).unwrap();
        assert_eq!(t.hour(), 7);
        assert_eq!(t.minute(), 45);
    }

    #[test]
    fn weekdays_is_a_condition_not_a_trigger() {
        let mut b = EventFactory::builder("weekdays").unwrap();
        b.parse_param("weekdays", "12345");
        assert!(b.finish_condition("UTC".into()).is_some());
    }

    #[test]
    fn sensor_update_routes_only_to_matching_blockheater() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        let manager = TriggerManager::new(
            "UTC".into(),
            Arc::new(NullSun),
            Arc::new(NullDevices),
            Duration::from_secs(5),
        );
        let factory = EventFactory::new();

        let mut b = EventFactory::builder("blockheater").unwrap();
        b.parse_param("hour", "7");
        b.parse_param("minute", "30");
        b.parse_param("clientSensorId", "42");
        let cb: FireCallback = Arc::new(move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        let trigger = b.finish_trigger("UTC".into(), cb).unwrap();
        factory.register(&manager, Some("42".into()), trigger);

        factory.sensor_value_updated(&manager, "99", -10.0, Utc::now());
        assert_eq!(factory.blockheater_handles.lock().len(), 1);

        factory.sensor_value_updated(&manager, "42", -10.0, Utc::now());
    }
}
