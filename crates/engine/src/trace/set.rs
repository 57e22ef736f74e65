use std::ops::Range;

use super::activity::Activity;
use crate::error::{EngineError, Result};
use crate::metrics::{Accumulator, Summary};

/// Same-kind activities may overlap by this much (seconds). GC logs print
/// timestamps with millisecond resolution, so back-to-back collections can
/// appear to overlap by less than one tick.
pub const OVERLAP_TOLERANCE_SECS: f64 = 1e-3;

/// Append-only sequence of activities with a running duration summary.
///
/// A per-kind set keeps its activities ordered by start and non-overlapping;
/// the aggregate set only keeps append order.
#[derive(Debug, Clone)]
pub struct ActivitySet {
    name: String,
    ordered: bool,
    activities: Vec<Activity>,
    durations: Accumulator,
}

impl ActivitySet {
    pub(crate) fn per_kind(name: &str) -> Self {
        Self::with_ordering(name, true)
    }

    pub(crate) fn aggregate(name: &str) -> Self {
        Self::with_ordering(name, false)
    }

    fn with_ordering(name: &str, ordered: bool) -> Self {
        Self {
            name: name.to_string(),
            ordered,
            activities: Vec::new(),
            durations: Accumulator::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check that `activity` may be appended, without appending it.
    pub(crate) fn check(&self, activity: &Activity) -> Result<()> {
        if !self.ordered {
            return Ok(());
        }
        if let Some(last) = self.activities.last() {
            if activity.start() < last.start() {
                return Err(EngineError::InvalidArgument(format!(
                    "{}: activity at {} starts before previous one at {}",
                    self.name,
                    activity.start(),
                    last.start()
                )));
            }
            if activity.start() + OVERLAP_TOLERANCE_SECS < last.end() {
                return Err(EngineError::InvalidArgument(format!(
                    "{}: activity at {} overlaps previous one ending at {}",
                    self.name,
                    activity.start(),
                    last.end()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, activity: Activity) {
        self.durations.add(activity.duration());
        self.activities.push(activity);
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Activity> {
        self.activities.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.activities.iter()
    }

    /// Activities in `range`, clamped to the current length.
    pub fn slice(&self, range: Range<usize>) -> &[Activity] {
        let end = range.end.min(self.activities.len());
        let start = range.start.min(end);
        &self.activities[start..end]
    }

    /// Summary of the activity durations.
    pub fn summary(&self) -> Summary {
        self.durations.summary()
    }

    pub fn first_start(&self) -> Option<f64> {
        self.activities.first().map(Activity::start)
    }

    pub fn last_end(&self) -> Option<f64> {
        self.activities.iter().map(Activity::end).reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stw(start: f64, duration: f64) -> Activity {
        Activity::stop_the_world("Young GC", start, duration).unwrap()
    }

    #[test]
    fn test_push_updates_summary() {
        let mut set = ActivitySet::per_kind("Young GC");
        for a in [stw(1.0, 0.01), stw(2.0, 0.03)] {
            set.check(&a).unwrap();
            set.push(a);
        }
        let summary = set.summary();
        assert_eq!(summary.count, 2);
        assert!((summary.sum - 0.04).abs() < 1e-12);
        assert_eq!(summary.max, 0.03);
        assert_eq!(set.last_end(), Some(2.03));
    }

    #[test]
    fn test_rejects_out_of_order_start() {
        let mut set = ActivitySet::per_kind("Young GC");
        set.push(stw(2.0, 0.01));
        assert!(set.check(&stw(1.0, 0.01)).is_err());
    }

    #[test]
    fn test_rejects_overlap_beyond_tolerance() {
        let mut set = ActivitySet::per_kind("Young GC");
        set.push(stw(1.0, 0.5));
        assert!(set.check(&stw(1.2, 0.1)).is_err());
        // overlapping by less than one log tick is accepted
        assert!(set.check(&stw(1.4995, 0.1)).is_ok());
    }

    #[test]
    fn test_aggregate_accepts_any_order() {
        let mut set = ActivitySet::aggregate("All");
        set.push(stw(5.0, 1.0));
        assert!(set.check(&stw(1.0, 0.1)).is_ok());
    }

    #[test]
    fn test_slice_is_clamped() {
        let mut set = ActivitySet::per_kind("Young GC");
        set.push(stw(1.0, 0.1));
        set.push(stw(2.0, 0.1));
        assert_eq!(set.slice(1..10).len(), 1);
        assert!(set.slice(5..9).is_empty());
    }
}
