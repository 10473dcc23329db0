//! Device-manager boundary (out of scope per the controller's own spec —
//! modeled here only as the trait surface the trigger engine consumes).

/// A physical quantity a sensor can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Temperature,
}

/// The scale a sensor reading is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Celsius,
}

/// A single device as seen by the core: readable sensor values only.
pub trait Device: Send + Sync {
    fn sensor_value(&self, sensor_type: SensorType, scale: Scale) -> Option<f64>;
}

/// Device registry the engine and bridge consult for sensor readings.
/// `device(id)` returns `None` for an unknown id, matching the external
/// system's "missing denotes unknown" contract.
pub trait DeviceManager: Send + Sync {
    fn device(&self, id: &str) -> Option<std::sync::Arc<dyn Device>>;
}
