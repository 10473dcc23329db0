use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Script-host worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptHostConfig {
    /// Directory scripts are loaded from.
    #[serde(default = "d_scripts_dir")]
    pub scripts_dir: PathBuf,
    /// Worker's timed wait on its task-queue condition, in milliseconds.
    #[serde(default = "d_worker_poll_ms")]
    pub worker_poll_ms: u64,
    /// Cross-thread bridge call timeout, in seconds.
    #[serde(default = "d_bridge_timeout_secs")]
    pub bridge_timeout_secs: u64,
}

impl Default for ScriptHostConfig {
    fn default() -> Self {
        Self {
            scripts_dir: d_scripts_dir(),
            worker_poll_ms: d_worker_poll_ms(),
            bridge_timeout_secs: d_bridge_timeout_secs(),
        }
    }
}

fn d_scripts_dir() -> PathBuf {
    PathBuf::from("./scripts")
}
fn d_worker_poll_ms() -> u64 {
    300
}
fn d_bridge_timeout_secs() -> u64 {
    20
}
