//! §4.1/§4.2/§4.3 — minute-resolution trigger engine and its EventFactory.

pub mod blockheater_trigger;
pub mod conditions;
pub mod factory;
pub mod index;
pub mod manager;
pub mod suntime_trigger;
pub mod time_trigger;
pub mod trigger;
pub mod tz;

pub use index::{TriggerHandle, TriggerIndex};
pub use manager::TriggerManager;
pub use trigger::{Trigger, TriggerContext, TriggerType};

use habctl_domain::device::DeviceManager;
use habctl_domain::sun::SunCalculator;

/// External collaborators a recalculation may need: sun position for
/// [`crate::suntime_trigger::SuntimeTrigger`], device readings for
/// [`crate::blockheater_trigger::BlockheaterTrigger`]. Bundled so
/// [`trigger::Trigger::recalculate`] takes one argument regardless of
/// which variant it dispatches to.
pub struct RecalcContext<'a> {
    pub sun: &'a dyn SunCalculator,
    pub devices: &'a dyn DeviceManager,
}
