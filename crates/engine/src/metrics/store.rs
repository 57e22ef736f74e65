use serde::Serialize;

use super::accumulator::{Accumulator, Summary};
use super::tag::{MetricTag, TimestampArity};
use crate::error::{EngineError, Result};

/// Timestamp attached to one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stamp {
    None,
    Point(f64),
    Interval { begin: f64, end: f64 },
}

impl Stamp {
    fn arity(&self) -> TimestampArity {
        match self {
            Stamp::None => TimestampArity::None,
            Stamp::Point(_) => TimestampArity::Point,
            Stamp::Interval { .. } => TimestampArity::Interval,
        }
    }

    /// The timestamp written by the save hook (interval begin for intervals).
    pub fn leading(&self) -> Option<f64> {
        match self {
            Stamp::None => None,
            Stamp::Point(t) => Some(*t),
            Stamp::Interval { begin, .. } => Some(*begin),
        }
    }
}

/// Accumulator for one channel, optionally keeping the raw samples.
#[derive(Debug, Clone)]
pub struct DataStore {
    tag: MetricTag,
    stats: Accumulator,
    retain: bool,
    values: Vec<f64>,
    stamps: Vec<Stamp>,
}

impl DataStore {
    pub fn new(tag: MetricTag, retain: bool) -> Self {
        Self {
            tag,
            stats: Accumulator::new(),
            retain,
            values: Vec::new(),
            stamps: Vec::new(),
        }
    }

    pub fn tag(&self) -> MetricTag {
        self.tag
    }

    /// Append one sample. The stamp must match the channel's arity.
    pub fn add(&mut self, value: f64, stamp: Stamp) -> Result<()> {
        if !value.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "{}: sample value {} is not finite",
                self.tag, value
            )));
        }
        if stamp.arity() != self.tag.arity() {
            return Err(EngineError::InvalidArgument(format!(
                "{}: expected {:?} timestamp, got {:?}",
                self.tag,
                self.tag.arity(),
                stamp.arity()
            )));
        }
        if let Stamp::Interval { begin, end } = stamp {
            if end < begin {
                return Err(EngineError::InvalidArgument(format!(
                    "{}: interval end {} before begin {}",
                    self.tag, end, begin
                )));
            }
        }

        self.stats.add(value);
        if self.retain {
            self.values.push(value);
            if self.tag.arity() != TimestampArity::None {
                self.stamps.push(stamp);
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> &Accumulator {
        &self.stats
    }

    pub fn summary(&self) -> Summary {
        self.stats.summary()
    }

    pub fn is_retaining(&self) -> bool {
        self.retain
    }

    /// Raw samples in arrival order (empty when retention is off).
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Timestamps parallel to [`values`](Self::values); empty for untimed channels.
    pub fn stamps(&self) -> &[Stamp] {
        &self.stamps
    }

    /// `(timestamp, value)` pairs; untimed channels use the sample index.
    pub fn series(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().enumerate().map(move |(i, v)| {
            let ts = self
                .stamps
                .get(i)
                .and_then(Stamp::leading)
                .unwrap_or(i as f64);
            (ts, *v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tag::{DerivedKind, HeapKind, PauseKind};

    #[test]
    fn test_add_retains_values_and_stamps() {
        let mut store = DataStore::new(MetricTag::Pause(PauseKind::YoungGc), true);
        store.add(0.012, Stamp::Interval { begin: 1.0, end: 1.012 }).unwrap();
        store.add(0.020, Stamp::Interval { begin: 2.0, end: 2.020 }).unwrap();

        assert_eq!(store.values(), &[0.012, 0.020]);
        assert_eq!(store.stamps().len(), 2);
        assert_eq!(store.stats().count(), 2);
        let series: Vec<_> = store.series().collect();
        assert_eq!(series, vec![(1.0, 0.012), (2.0, 0.020)]);
    }

    #[test]
    fn test_untimed_channel_keeps_no_stamps() {
        let mut store = DataStore::new(MetricTag::Derived(DerivedKind::Promoted), true);
        store.add(128.0, Stamp::None).unwrap();
        store.add(256.0, Stamp::None).unwrap();
        assert!(store.stamps().is_empty());
        let series: Vec<_> = store.series().collect();
        assert_eq!(series, vec![(0.0, 128.0), (1.0, 256.0)]);
    }

    #[test]
    fn test_arity_mismatch_rejected_before_mutation() {
        let mut store = DataStore::new(MetricTag::Heap(HeapKind::HeapAfter), true);
        let err = store.add(1024.0, Stamp::None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(store.stats().is_empty());
        assert!(store.values().is_empty());
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let mut store = DataStore::new(MetricTag::Pause(PauseKind::FullGc), false);
        assert!(store.add(0.5, Stamp::Interval { begin: 3.0, end: 2.0 }).is_err());
    }

    #[test]
    fn test_no_retention_still_accumulates() {
        let mut store = DataStore::new(MetricTag::Heap(HeapKind::HeapAfter), false);
        store.add(1024.0, Stamp::Point(1.0)).unwrap();
        assert!(store.values().is_empty());
        assert_eq!(store.summary().count, 1);
    }
}
