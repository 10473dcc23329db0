//! Script log channel boundary (external websocket fan-out per the
//! controller's own spec). The only process-wide state per §9's design
//! notes — a pure fan-out, safe to share across every script worker.

/// Receives a formatted message from a script's `print` and forwards it
/// as `(channel="lua", topic="log", payload=message)`.
pub trait LogSink: Send + Sync {
    fn log(&self, script: &str, message: &str);
}
