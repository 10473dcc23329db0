//! Builds a runnable instance of the core out of `habctl-scheduler` and
//! `habctl-scripthost`, wired against this crate's demo implementations of
//! the out-of-scope external collaborators. One `AppState` struct holds
//! every shared service the CLI commands and the serve loop need.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use habctl_domain::config::Config;
use habctl_scheduler::TriggerManager;
use habctl_scripthost::{Bridge, Script};
use parking_lot::RwLock;

use crate::devices::InMemoryDeviceManager;
use crate::log_sink::TracingLogSink;
use crate::queue::ChannelMainThreadQueue;
use crate::sun::SunriseCrateSunCalculator;

/// Shared services wired up from [`Config`]. Cheap to clone — every field
/// is already reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<ChannelMainThreadQueue>,
    pub devices: Arc<InMemoryDeviceManager>,
    pub triggers: Arc<TriggerManager>,
    pub bridge: Arc<Bridge>,
    scripts: Arc<RwLock<HashMap<String, Arc<Script>>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let queue = Arc::new(ChannelMainThreadQueue::new());
        let devices = Arc::new(InMemoryDeviceManager::new());
        let bridge = Bridge::new(
            queue.clone() as Arc<dyn habctl_domain::queue::MainThreadQueue>,
            Duration::from_secs(config.scripthost.bridge_timeout_secs),
        );
        let triggers = TriggerManager::new(
            config.settings.tz.clone(),
            Arc::new(SunriseCrateSunCalculator),
            devices.clone() as Arc<dyn habctl_domain::device::DeviceManager>,
            Duration::from_secs(config.scheduler.tick_interval_secs),
        );

        Self {
            config,
            queue,
            devices,
            triggers,
            bridge,
            scripts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// §4.4: load every `*.lua` file in `scripts_dir` as a [`Script`] and
    /// `reload()` it, so it progresses CLOSED -> LOADING and eventually
    /// IDLE on its own worker thread.
    pub fn load_scripts_dir(&self) -> anyhow::Result<usize> {
        let dir = &self.config.scripthost.scripts_dir;
        if !dir.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("lua") {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("script")
                .to_string();
            self.load_script(path, name)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn load_script(&self, path: PathBuf, name: String) -> anyhow::Result<Arc<Script>> {
        let script = Script::new(
            path,
            name.clone(),
            Arc::new(TracingLogSink) as Arc<dyn habctl_domain::log_sink::LogSink>,
            self.devices.clone() as Arc<dyn habctl_domain::device::DeviceManager>,
            self.bridge.clone(),
            Duration::from_millis(self.config.scripthost.worker_poll_ms),
        );
        script.reload()?;
        self.scripts.write().insert(name, script.clone());
        Ok(script)
    }

    pub fn script(&self, name: &str) -> Option<Arc<Script>> {
        self.scripts.read().get(name).cloned()
    }

    pub fn script_names(&self) -> Vec<String> {
        self.scripts.read().keys().cloned().collect()
    }

    pub fn shutdown(&self) {
        self.triggers.stop();
        for (_, script) in self.scripts.write().drain() {
            script.shutdown();
        }
    }
}
