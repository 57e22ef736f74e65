use std::sync::Arc;

use crate::error::{EngineError, Result};

/// Overhead of a stop-the-world activity: it owns the whole machine.
pub const STW_OVERHEAD_PERCENT: f64 = 100.0;

/// A named category of collector activity. Ids are dense, assigned in
/// first-seen order within one trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityKind {
    id: usize,
    name: Arc<str>,
}

impl ActivityKind {
    pub(crate) fn new(id: usize, name: Arc<str>) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }
}

/// One immutable collector activity on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    kind: Arc<str>,
    start: f64,
    duration: f64,
    stw: bool,
    overhead: f64,
}

impl Activity {
    /// Build an activity; `overhead: None` means stop-the-world.
    pub fn new(
        kind: impl Into<Arc<str>>,
        start: f64,
        duration: f64,
        overhead: Option<f64>,
    ) -> Result<Self> {
        match overhead {
            None => Self::stop_the_world(kind, start, duration),
            Some(overhead) => Self::concurrent(kind, start, duration, overhead),
        }
    }

    pub fn stop_the_world(kind: impl Into<Arc<str>>, start: f64, duration: f64) -> Result<Self> {
        Self::build(kind.into(), start, duration, true, STW_OVERHEAD_PERCENT)
    }

    pub fn concurrent(
        kind: impl Into<Arc<str>>,
        start: f64,
        duration: f64,
        overhead: f64,
    ) -> Result<Self> {
        Self::build(kind.into(), start, duration, false, overhead)
    }

    fn build(kind: Arc<str>, start: f64, duration: f64, stw: bool, overhead: f64) -> Result<Self> {
        if kind.is_empty() {
            return Err(EngineError::InvalidArgument("activity kind name is empty".into()));
        }
        if !start.is_finite() || start < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "{}: start {} must be a finite non-negative number",
                kind, start
            )));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "{}: duration {} must be a finite non-negative number",
                kind, duration
            )));
        }
        if !(0.0..=100.0).contains(&overhead) {
            return Err(EngineError::InvalidArgument(format!(
                "{}: overhead {}% outside [0, 100]",
                kind, overhead
            )));
        }
        Ok(Self {
            kind,
            start,
            duration,
            stw,
            overhead,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn is_stw(&self) -> bool {
        self.stw
    }

    /// Share of the elapsed time attributable to this activity, in percent.
    pub fn overhead_percent(&self) -> f64 {
        self.overhead
    }

    /// `Some(overhead)` for concurrent activities, `None` for stop-the-world.
    pub fn concurrent_overhead(&self) -> Option<f64> {
        if self.stw {
            None
        } else {
            Some(self.overhead)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_the_world_defaults() {
        let a = Activity::stop_the_world("Young GC", 1.25, 0.012).unwrap();
        assert!(a.is_stw());
        assert_eq!(a.overhead_percent(), 100.0);
        assert_eq!(a.end(), 1.25 + 0.012);
        assert_eq!(a.concurrent_overhead(), None);
    }

    #[test]
    fn test_concurrent_keeps_overhead() {
        let a = Activity::concurrent("Full GC", 2.0, 0.5, 87.5).unwrap();
        assert!(!a.is_stw());
        assert_eq!(a.overhead_percent(), 87.5);
        assert_eq!(a.concurrent_overhead(), Some(87.5));
    }

    #[test]
    fn test_rejects_negative_duration() {
        let err = Activity::stop_the_world("Young GC", 1.0, -0.1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_negative_start() {
        assert!(Activity::stop_the_world("Young GC", -1.0, 0.1).is_err());
    }

    #[test]
    fn test_rejects_overhead_out_of_range() {
        assert!(Activity::concurrent("x", 0.0, 1.0, 100.5).is_err());
        assert!(Activity::concurrent("x", 0.0, 1.0, -0.5).is_err());
        assert!(Activity::concurrent("x", 0.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_rejects_empty_kind() {
        assert!(Activity::stop_the_world("", 0.0, 1.0).is_err());
    }
}
