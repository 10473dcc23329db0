//! Main-loop boundary (external, per the controller's own spec): the only
//! thread permitted to touch host objects reachable from scripts. The
//! bridge and the trigger engine both submit work here instead of calling
//! host objects directly from a worker or timer thread.

/// Accepts a job from any thread and runs it on the host's main loop.
pub trait MainThreadQueue: Send + Sync {
    fn submit(&self, job: Box<dyn FnOnce() + Send>);
}
