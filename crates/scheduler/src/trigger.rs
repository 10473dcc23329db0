use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::blockheater_trigger::BlockheaterTrigger;
use crate::suntime_trigger::SuntimeTrigger;
use crate::time_trigger::TimeTrigger;

static NEXT_TRIGGER_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_trigger_id() -> u64 {
    NEXT_TRIGGER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Passed to the rule-engine's fire callback when a trigger's moment
/// arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    Time,
    Suntime,
    Blockheater,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Time => "time",
            TriggerType::Suntime => "suntime",
            TriggerType::Blockheater => "blockheater",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerContext {
    pub triggertype: TriggerType,
}

pub type FireCallback = Arc<dyn Fn(TriggerContext) + Send + Sync>;

/// Fields and invariants shared by every trigger kind (§3's "Trigger
/// (abstract)"). Embedded by value — composition stands in for the
/// original's inheritance.
pub struct TriggerCore {
    pub id: u64,
    /// Scheduled minute-of-hour, in [0, 59]; the bucket key.
    pub minute: u32,
    /// Scheduled hour, in [0, 23], or -1 meaning "every hour".
    pub hour: i32,
    pub active: bool,
    pub timezone: String,
    pub on_fire: FireCallback,
}

impl TriggerCore {
    pub fn new(timezone: String, on_fire: FireCallback) -> Self {
        Self {
            id: next_trigger_id(),
            minute: 0,
            hour: -1,
            active: true,
            timezone,
            on_fire,
        }
    }
}

/// Every trigger kind the factory can build, unified so the index can
/// hold one handle type per bucket entry.
pub enum Trigger {
    Time(TimeTrigger),
    Suntime(SuntimeTrigger),
    Blockheater(BlockheaterTrigger),
}

impl Trigger {
    pub fn core(&self) -> &TriggerCore {
        match self {
            Trigger::Time(t) => &t.core,
            Trigger::Suntime(t) => &t.time.core,
            Trigger::Blockheater(t) => &t.time.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut TriggerCore {
        match self {
            Trigger::Time(t) => &mut t.core,
            Trigger::Suntime(t) => &mut t.time.core,
            Trigger::Blockheater(t) => &mut t.time.core,
        }
    }

    pub fn id(&self) -> u64 {
        self.core().id
    }

    pub fn minute(&self) -> u32 {
        self.core().minute
    }

    pub fn hour(&self) -> i32 {
        self.core().hour
    }

    pub fn active(&self) -> bool {
        self.core().active
    }

    pub fn triggertype(&self) -> TriggerType {
        match self {
            Trigger::Time(_) => TriggerType::Time,
            Trigger::Suntime(_) => TriggerType::Suntime,
            Trigger::Blockheater(_) => TriggerType::Blockheater,
        }
    }

    /// Re-derive `(hour, minute, active)` from external inputs. Returns
    /// true iff the bucket key changed and the index must relocate this
    /// trigger.
    pub fn recalculate(&mut self, now_utc: DateTime<Utc>, ctx: &crate::RecalcContext<'_>) -> bool {
        match self {
            Trigger::Time(t) => t.recalculate(now_utc),
            Trigger::Suntime(t) => t.recalculate(now_utc, ctx.sun),
            Trigger::Blockheater(t) => t.recalculate(now_utc, ctx.devices),
        }
    }

    pub fn fire(&self) {
        let ctx = TriggerContext {
            triggertype: self.triggertype(),
        };
        (self.core().on_fire)(ctx);
    }
}
