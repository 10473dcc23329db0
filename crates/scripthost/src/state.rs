/// §3 Script lifecycle state. Transitions only via [`crate::script::Script`]'s
/// internal `set_state`, which is the sole writer and also the emitter of
/// `TraceEvent::ScriptStateChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Closed,
    Loading,
    Running,
    Idle,
    Error,
    Closing,
}

impl ScriptState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptState::Closed => "closed",
            ScriptState::Loading => "loading",
            ScriptState::Running => "running",
            ScriptState::Idle => "idle",
            ScriptState::Error => "error",
            ScriptState::Closing => "closing",
        }
    }
}
