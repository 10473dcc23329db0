//! C3 DeviceManager demo implementation (§6): an in-memory sensor table,
//! mutable via [`InMemoryDeviceManager::set_temperature`] so the
//! block-heater scenario (S3) is exercisable without a real device bus.

use std::collections::HashMap;
use std::sync::Arc;

use habctl_domain::device::{Device, DeviceManager, Scale, SensorType};
use parking_lot::RwLock;

struct InMemoryDevice {
    temperature_c: RwLock<Option<f64>>,
}

impl Device for InMemoryDevice {
    fn sensor_value(&self, sensor_type: SensorType, scale: Scale) -> Option<f64> {
        match (sensor_type, scale) {
            (SensorType::Temperature, Scale::Celsius) => *self.temperature_c.read(),
        }
    }
}

/// Demo [`DeviceManager`]: a fixed set of devices keyed by id, each with a
/// settable temperature reading.
#[derive(Default)]
pub struct InMemoryDeviceManager {
    devices: RwLock<HashMap<String, Arc<InMemoryDevice>>>,
}

impl InMemoryDeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device id with no reading yet (sensor "unavailable").
    pub fn add_device(&self, id: impl Into<String>) {
        self.devices.write().insert(
            id.into(),
            Arc::new(InMemoryDevice {
                temperature_c: RwLock::new(None),
            }),
        );
    }

    /// Push a fresh temperature reading, registering the device first if
    /// it doesn't exist yet.
    pub fn set_temperature(&self, id: &str, celsius: f64) {
        let existing = self.devices.read().get(id).cloned();
        let device = match existing {
            Some(d) => d,
            None => {
                let d = Arc::new(InMemoryDevice {
                    temperature_c: RwLock::new(None),
                });
                self.devices.write().insert(id.to_string(), d.clone());
                d
            }
        };
        *device.temperature_c.write() = Some(celsius);
    }
}

impl DeviceManager for InMemoryDeviceManager {
    fn device(&self, id: &str) -> Option<Arc<dyn Device>> {
        self.devices
            .read()
            .get(id)
            .cloned()
            .map(|d| d as Arc<dyn Device>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_device_is_none() {
        let dm = InMemoryDeviceManager::new();
        assert!(dm.device("nope").is_none());
    }

    #[test]
    fn reading_round_trips() {
        let dm = InMemoryDeviceManager::new();
        dm.set_temperature("42", -10.0);
        let dev = dm.device("42").unwrap();
        assert_eq!(
            dev.sensor_value(SensorType::Temperature, Scale::Celsius),
            Some(-10.0)
        );
    }

    #[test]
    fn registered_device_with_no_reading_is_unavailable() {
        let dm = InMemoryDeviceManager::new();
        dm.add_device("43");
        let dev = dm.device("43").unwrap();
        assert_eq!(dev.sensor_value(SensorType::Temperature, Scale::Celsius), None);
    }
}
