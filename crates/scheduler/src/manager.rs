use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{Timelike, Utc};
use habctl_domain::device::DeviceManager;
use habctl_domain::sun::SunCalculator;
use habctl_domain::trace::TraceEvent;
use parking_lot::{Condvar, Mutex};

use crate::index::{TriggerHandle, TriggerIndex};
use crate::trigger::Trigger;
use crate::tz::parse_tz;
use crate::RecalcContext;

/// §4.1 Trigger Engine (C4): holds the [`TriggerIndex`] and runs the
/// background ticker that fires buckets as wall-clock minutes arrive.
pub struct TriggerManager {
    index: Arc<Mutex<TriggerIndex>>,
    timezone: Arc<Mutex<String>>,
    sun: Arc<dyn SunCalculator>,
    devices: Arc<dyn DeviceManager>,
    tick_interval: Duration,
    last_minute: Mutex<Option<u32>>,
    stop: Arc<(Mutex<bool>, Condvar)>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TriggerManager {
    pub fn new(
        timezone: String,
        sun: Arc<dyn SunCalculator>,
        devices: Arc<dyn DeviceManager>,
        tick_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            index: Arc::new(Mutex::new(TriggerIndex::new())),
            timezone: Arc::new(Mutex::new(timezone)),
            sun,
            devices,
            tick_interval,
            last_minute: Mutex::new(None),
            stop: Arc::new((Mutex::new(false), Condvar::new())),
            thread: Mutex::new(None),
        })
    }

    pub fn add(&self, trigger: Trigger) -> TriggerHandle {
        self.index.lock().add(trigger)
    }

    pub fn delete(&self, handle: &TriggerHandle) {
        self.index.lock().delete(handle);
    }

    /// Re-file a handle under its current minute, used after an
    /// out-of-band recalculation (e.g. a pushed sensor reading) changes
    /// its bucket key.
    pub fn relocate(&self, handle: &TriggerHandle) {
        self.index.lock().relocate(handle);
    }

    pub fn clear_all(&self) {
        self.index.lock().clear();
    }

    pub fn set_timezone(&self, tz: String) {
        *self.timezone.lock() = tz;
        self.recalc_all();
    }

    /// §4.3 `recalcTrigger()`: force a full recalculation, used when
    /// lat/lon/timezone settings change.
    pub fn recalc_all(&self) {
        let now = Utc::now();
        let handles = self.index.lock().all();
        let ctx = RecalcContext {
            sun: self.sun.as_ref(),
            devices: self.devices.as_ref(),
        };
        let mut to_relocate = Vec::new();
        for handle in &handles {
            let changed = handle.lock().recalculate(now, &ctx);
            if changed {
                to_relocate.push(handle.clone());
            }
        }
        let mut idx = self.index.lock();
        for h in to_relocate {
            if h.lock().active() {
                idx.relocate(&h);
            } else {
                idx.delete(&h);
            }
        }
    }

    /// Spawn the background ticker thread. Idempotent if already running.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.thread.lock();
        if guard.is_some() {
            return;
        }
        let this = self.clone();
        *guard = Some(std::thread::spawn(move || this.run()));
    }

    pub fn stop(&self) {
        {
            let (lock, cvar) = &*self.stop;
            *lock.lock() = true;
            cvar.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }

    fn run(&self) {
        loop {
            {
                let (lock, cvar) = &*self.stop;
                let mut stopped = lock.lock();
                if *stopped {
                    return;
                }
                let result = cvar.wait_for(&mut stopped, self.tick_interval);
                if *stopped {
                    return;
                }
                let _ = result;
            }
            self.tick();
        }
    }

    /// One pass of the ~5s ticker: detect a minute boundary crossing and,
    /// if one occurred, process that minute's bucket exactly once (§5's
    /// "a minute is processed at most once per tick" guarantee, via
    /// `last_minute`).
    fn tick(&self) {
        let tz = parse_tz(&self.timezone.lock());
        let now_utc = Utc::now();
        let local = now_utc.with_timezone(&tz);
        let current_minute = local.minute();
        let current_hour = local.hour() as i32;

        let mut last = self.last_minute.lock();
        if *last == Some(current_minute) {
            return;
        }
        *last = Some(current_minute);
        drop(last);

        self.process_minute(current_minute, current_hour, now_utc);
    }

    fn process_minute(&self, current_minute: u32, current_local_hour: i32, now_utc: chrono::DateTime<Utc>) {
        let handles = self.index.lock().bucket(current_minute);
        let mut to_relocate = Vec::new();

        for handle in &handles {
            let mut should_fire = false;
            {
                let mut trig = handle.lock();
                if trig.hour() != -1 && trig.hour() != current_local_hour {
                    continue;
                }
                if matches!(&*trig, Trigger::Suntime(_)) {
                    let ctx = RecalcContext {
                        sun: self.sun.as_ref(),
                        devices: self.devices.as_ref(),
                    };
                    if trig.recalculate(now_utc, &ctx) {
                        to_relocate.push(handle.clone());
                    }
                }
                should_fire = trig.active();
            }
            if should_fire {
                let trig = handle.lock();
                TraceEvent::TriggerFired {
                    trigger_id: trig.id().to_string(),
                    triggertype: trig.triggertype().as_str().to_string(),
                    minute: current_minute,
                    hour: current_local_hour,
                }
                .emit();
                trig.fire();
            }
        }

        let mut idx = self.index.lock();
        for h in to_relocate {
            if h.lock().active() {
                idx.relocate(&h);
            } else {
                idx.delete(&h);
            }
        }
    }
}

impl Drop for TriggerManager {
    fn drop(&mut self) {
        self.stop();
    }
}
