//! Wiring for the habctl core: CLI, config loading, tracing init, and the
//! minimal concrete implementations of the out-of-scope external
//! collaborators (§1/§6) needed to run the trigger engine and script host
//! end to end. None of this is product surface — the rule-engine
//! composition layer, plugin container, and websocket fan-out that would
//! normally own this wiring are out of scope per the controller's own
//! spec.

pub mod cli;
pub mod devices;
pub mod log_sink;
pub mod queue;
pub mod sun;
pub mod wiring;
