//! §4.4/§4.5 — the per-script sandbox supervisor (C7) and the
//! cross-thread attribute bridge (C8) it talks to host objects through.

pub mod bridge;
pub mod script;
pub mod state;
pub mod task;
pub mod whitelist;

pub use bridge::Bridge;
pub use script::Script;
pub use state::ScriptState;
pub use task::{ScriptArg, Task};
