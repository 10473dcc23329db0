//! C2 Main-Thread Queue (§6, §9): the only thread permitted to touch host
//! objects reachable from scripts. The bridge and the trigger engine
//! submit jobs here from any thread instead of calling host objects
//! directly.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use habctl_domain::queue::MainThreadQueue;
use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send>;

/// `std::sync::mpsc`-backed [`MainThreadQueue`]. `submit` is callable from
/// any thread; `pump_once`/`run_forever` must only ever be called from the
/// one thread that owns the host objects. `Receiver` is `Send` but not
/// `Sync`, and `MainThreadQueue` requires `Sync` so the handle can sit
/// behind a shared `Arc`; the receiving side is kept in a `Mutex` purely
/// to satisfy that bound; there is still only ever one consumer.
pub struct ChannelMainThreadQueue {
    tx: Sender<Job>,
    rx: Mutex<Receiver<Job>>,
}

impl ChannelMainThreadQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Run one job if one is waiting, without blocking.
    pub fn pump_once(&self) -> bool {
        match self.rx.lock().try_recv() {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    /// Block for up to `timeout` for the next job and run it if one
    /// arrives.
    pub fn pump_timeout(&self, timeout: Duration) -> bool {
        match self.rx.lock().recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    /// Drain and run jobs forever. Never returns; call from the process's
    /// designated main loop thread only.
    pub fn run_forever(&self) -> ! {
        loop {
            let job = self.rx.lock().recv();
            if let Ok(job) = job {
                job();
            }
        }
    }
}

impl Default for ChannelMainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadQueue for ChannelMainThreadQueue {
    fn submit(&self, job: Job) {
        // A closed receiver means the main loop has shut down; there is
        // nothing left to run the job against, so drop it silently
        // rather than panic the caller's thread.
        let _ = self.tx.send(job);
    }
}
