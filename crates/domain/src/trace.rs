use serde::Serialize;

/// Structured trace events emitted across the scheduler and script-host crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TriggerFired {
        trigger_id: String,
        triggertype: String,
        minute: u32,
        hour: i32,
    },
    TriggerRecalculated {
        trigger_id: String,
        triggertype: String,
        hour: i32,
        minute: u32,
        active: bool,
        changed: bool,
    },
    TriggerInactive {
        trigger_id: String,
        triggertype: String,
        reason: String,
    },
    ScriptStateChanged {
        script: String,
        from: String,
        to: String,
    },
    SignalEnqueued {
        script: String,
        signal: String,
    },
    SignalRejected {
        script: String,
        signal: String,
        state: String,
    },
    SandboxViolation {
        script: String,
        name: String,
    },
    BridgeCallTimedOut {
        script: String,
        function: String,
        timeout_secs: u64,
    },
    ScriptLogEmitted {
        script: String,
        message: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "habctl_event");
    }
}
