use serde::{Deserialize, Serialize};

/// Trigger-engine ticker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the background ticker wakes to check for a new minute.
    #[serde(default = "d_tick_secs")]
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: d_tick_secs(),
        }
    }
}

fn d_tick_secs() -> u64 {
    5
}
