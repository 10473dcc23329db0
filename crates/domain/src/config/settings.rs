use serde::{Deserialize, Serialize};

/// Settings consumed by the trigger engine: timezone and observer location.
/// Mirrors the external `Settings` key/value store (`tz`, `latitude`,
/// `longitude`) the engine reads in the running system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "d_tz")]
    pub tz: String,
    #[serde(default = "d_latitude")]
    pub latitude: f64,
    #[serde(default = "d_longitude")]
    pub longitude: f64,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            tz: d_tz(),
            latitude: d_latitude(),
            longitude: d_longitude(),
        }
    }
}

fn d_tz() -> String {
    "UTC".into()
}
fn d_latitude() -> f64 {
    55.699592
}
fn d_longitude() -> f64 {
    13.187836
}
