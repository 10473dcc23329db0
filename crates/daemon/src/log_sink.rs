//! Script log channel (§6): scripts' `print` calls fan out as
//! `(channel="lua", topic="log", payload=message)` to an external
//! websocket; here that external sink is just `tracing`, with the same
//! structured-field logging convention used throughout this workspace.

use habctl_domain::log_sink::LogSink;

pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, script: &str, message: &str) {
        tracing::info!(channel = "lua", topic = "log", script = %script, payload = %message);
    }
}
