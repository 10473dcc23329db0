use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::trigger::Trigger;

pub type TriggerHandle = Arc<Mutex<Trigger>>;

/// §3 TriggerIndex: minute-of-hour -> the triggers currently filed there.
/// Every live trigger appears in exactly one bucket, keyed by its current
/// `minute` (invariant 1, §8).
#[derive(Default)]
pub struct TriggerIndex {
    buckets: HashMap<u32, Vec<TriggerHandle>>,
}

impl TriggerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under `trigger.minute`.
    pub fn add(&mut self, trigger: Trigger) -> TriggerHandle {
        let minute = trigger.minute();
        let handle = Arc::new(Mutex::new(trigger));
        self.buckets.entry(minute).or_default().push(handle.clone());
        handle
    }

    /// Remove from whichever bucket contains it.
    pub fn delete(&mut self, handle: &TriggerHandle) {
        for bucket in self.buckets.values_mut() {
            bucket.retain(|h| !Arc::ptr_eq(h, handle));
        }
    }

    /// Drop all buckets.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn bucket(&self, minute: u32) -> Vec<TriggerHandle> {
        self.buckets.get(&minute).cloned().unwrap_or_default()
    }

    pub fn all(&self) -> Vec<TriggerHandle> {
        self.buckets.values().flatten().cloned().collect()
    }

    /// Move `handle` into the bucket for its current minute. Used to
    /// relocate a trigger after a recalculation changed its bucket key.
    pub fn relocate(&mut self, handle: &TriggerHandle) {
        self.delete(handle);
        let minute = handle.lock().minute();
        self.buckets.entry(minute).or_default().push(handle.clone());
    }

    /// Invariant 1 (§8), for tests: every handle sits in exactly the
    /// bucket matching its current minute.
    #[cfg(test)]
    pub fn check_bucket_invariant(&self) -> bool {
        self.buckets.iter().all(|(bucket_minute, handles)| {
            handles
                .iter()
                .all(|h| h.lock().minute() == *bucket_minute)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_trigger::TimeTrigger;
    use std::sync::Arc as StdArc;

    fn noop() -> crate::trigger::FireCallback {
        StdArc::new(|_| {})
    }

    #[test]
    fn add_files_under_current_minute() {
        let mut idx = TriggerIndex::new();
        let t = TimeTrigger::new("UTC".into(), -1, 15, noop());
        idx.add(Trigger::Time(t));
        assert_eq!(idx.bucket(15).len(), 1);
        assert!(idx.check_bucket_invariant());
    }

    #[test]
    fn delete_removes_from_its_bucket() {
        let mut idx = TriggerIndex::new();
        let t = TimeTrigger::new("UTC".into(), -1, 20, noop());
        let handle = idx.add(Trigger::Time(t));
        idx.delete(&handle);
        assert_eq!(idx.bucket(20).len(), 0);
    }

    #[test]
    fn relocate_moves_bucket_on_minute_change() {
        let mut idx = TriggerIndex::new();
        let t = TimeTrigger::new("UTC".into(), -1, 10, noop());
        let handle = idx.add(Trigger::Time(t));
        handle.lock().core_mut().minute = 40;
        idx.relocate(&handle);
        assert_eq!(idx.bucket(10).len(), 0);
        assert_eq!(idx.bucket(40).len(), 1);
        assert!(idx.check_bucket_invariant());
    }

    #[test]
    fn clear_drops_all_buckets() {
        let mut idx = TriggerIndex::new();
        idx.add(Trigger::Time(TimeTrigger::new("UTC".into(), -1, 1, noop())));
        idx.add(Trigger::Time(TimeTrigger::new("UTC".into(), -1, 2, noop())));
        idx.clear();
        assert!(idx.all().is_empty());
    }
}
