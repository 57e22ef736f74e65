use regex::Captures;

use crate::conf::EngineConfig;
use crate::error::{EngineError, Result};
use crate::metrics::{CmsPhase, DerivedKind, HeapKind, MetricSet, MetricTag, PauseKind, Stamp};
use crate::timing::TimingWindow;
use crate::trace::Trace;

/// Collector state carried from one matched line to the next within a source.
#[derive(Debug, Clone, Default)]
pub struct GcState {
    last_timestamp: Option<f64>,
    heap_after: Option<f64>,
    young_after: Option<f64>,
    last_collection_end: Option<f64>,
    last_event_end: Option<f64>,
    pending_phases: [Option<f64>; 5],
}

impl GcState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    pub(crate) fn start_phase(&mut self, phase: CmsPhase, ts: f64) {
        self.pending_phases[phase_slot(phase)] = Some(ts);
    }

    pub(crate) fn take_phase_start(&mut self, phase: CmsPhase) -> Option<f64> {
        self.pending_phases[phase_slot(phase)].take()
    }
}

fn phase_slot(phase: CmsPhase) -> usize {
    match phase {
        CmsPhase::Mark => 0,
        CmsPhase::Preclean => 1,
        CmsPhase::AbortablePreclean => 2,
        CmsPhase::Sweep => 3,
        CmsPhase::Reset => 4,
    }
}

/// Everything a matcher may update while extracting one line.
pub struct Extraction<'a> {
    pub source_id: &'a str,
    pub line_no: u64,
    pub config: &'a EngineConfig,
    pub metrics: &'a mut MetricSet,
    pub window: &'a mut TimingWindow,
    pub state: &'a mut GcState,
    pub trace: &'a Trace,
}

/// Used/after/capacity triple of one space, in KB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupancy {
    pub before: f64,
    pub after: f64,
    pub capacity: f64,
}

/// One stop-the-world collection as read from a log line.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Collection {
    pub kind: PauseKind,
    pub start: f64,
    pub pause: f64,
    pub heap: Occupancy,
    pub young: Option<Occupancy>,
    pub old: Option<Occupancy>,
    pub perm: Option<Occupancy>,
}

impl<'a> Extraction<'a> {
    // ── Field parsing ────────────────────────────────────────────

    fn malformed(&self, field: &'static str, value: &str) -> EngineError {
        EngineError::MalformedInput {
            source_id: self.source_id.to_string(),
            line: self.line_no,
            field,
            value: value.to_string(),
        }
    }

    /// Decimal field with `.` or `,` separator.
    pub fn number(&self, field: &'static str, raw: &str) -> Result<f64> {
        raw.replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.malformed(field, raw))
    }

    /// Size field in KB.
    pub fn size(&self, field: &'static str, raw: &str) -> Result<f64> {
        raw.parse::<u64>()
            .map(|v| v as f64)
            .map_err(|_| self.malformed(field, raw))
    }

    pub(crate) fn capture_number(&self, caps: &Captures<'_>, name: &'static str) -> Result<f64> {
        let raw = caps.name(name).map(|m| m.as_str()).unwrap_or("");
        self.number(name, raw)
    }

    pub(crate) fn capture_size(&self, caps: &Captures<'_>, name: &'static str) -> Result<f64> {
        let raw = caps.name(name).map(|m| m.as_str()).unwrap_or("");
        self.size(name, raw)
    }

    /// The `<prefix>_before/_after/_cap` triple if the grammar captured it.
    pub(crate) fn occupancy(
        &self,
        caps: &Captures<'_>,
        fields: [&'static str; 3],
    ) -> Result<Option<Occupancy>> {
        if caps.name(fields[0]).is_none() {
            return Ok(None);
        }
        Ok(Some(Occupancy {
            before: self.capture_size(caps, fields[0])?,
            after: self.capture_size(caps, fields[1])?,
            capacity: self.capture_size(caps, fields[2])?,
        }))
    }

    // ── Timestamps ───────────────────────────────────────────────

    /// Timestamp of the current line on the run's timeline.
    ///
    /// An explicit elapsed-seconds field is shifted by the source offset.
    /// Without one, the previous timestamp plus one second is used, pushed
    /// past the end of the last observed event, and the run is flagged as
    /// having generated timestamps.
    pub fn timestamp(&mut self, raw: Option<&str>) -> Result<f64> {
        if let Some(raw) = raw {
            let value = self.number("timestamp", raw)?;
            return Ok(self.explicit_timestamp(value));
        }
        let next = self
            .state
            .last_timestamp
            .map(|prev| prev + 1.0)
            .unwrap_or_else(|| self.metrics.offset());
        let ts = match self.state.last_event_end {
            Some(end) => next.max(end),
            None => next,
        };
        self.metrics.mark_generated_timestamps();
        self.metrics.observe(ts);
        self.state.last_timestamp = Some(ts);
        self.window.observe(ts);
        Ok(ts)
    }

    /// Place an already parsed source timestamp on the run's timeline.
    pub fn explicit_timestamp(&mut self, raw: f64) -> f64 {
        let ts = self.metrics.adjust_timestamp(raw);
        self.state.last_timestamp = Some(ts);
        self.window.observe(ts);
        ts
    }

    pub(crate) fn capture_timestamp(&mut self, caps: &Captures<'_>) -> Result<f64> {
        self.timestamp(caps.name("ts").map(|m| m.as_str()))
    }

    /// Extend the source and window spans to an event end.
    pub fn observe_end(&mut self, ts: f64) {
        self.state.last_event_end = Some(self.state.last_event_end.map_or(ts, |end| end.max(ts)));
        self.metrics.observe(ts);
        self.window.observe(ts);
    }

    // ── Recording ────────────────────────────────────────────────

    pub fn record(&mut self, tag: MetricTag, value: f64, stamp: Stamp) -> Result<()> {
        self.metrics.record(tag, value, stamp)
    }

    /// Append an activity to the trace. An activity the trace rejects is
    /// logged and skipped; the line's samples are kept.
    pub fn activity(
        &mut self,
        name: &str,
        start: f64,
        duration: f64,
        overhead: Option<f64>,
    ) -> Result<()> {
        match self.trace.record(name, start, duration, overhead) {
            Ok(_) => Ok(()),
            Err(EngineError::InvalidArgument(reason)) => {
                tracing::warn!(
                    source = %self.source_id,
                    line = self.line_no,
                    activity = name,
                    %reason,
                    "parser: activity skipped"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn heap_points(
        &mut self,
        space: Option<Occupancy>,
        kinds: [HeapKind; 3],
        start: f64,
        end: f64,
    ) -> Result<()> {
        if let Some(occ) = space {
            self.record(MetricTag::Heap(kinds[0]), occ.before, Stamp::Point(start))?;
            self.record(MetricTag::Heap(kinds[1]), occ.after, Stamp::Point(end))?;
            self.record(MetricTag::Heap(kinds[2]), occ.capacity, Stamp::Point(start))?;
        }
        Ok(())
    }

    /// Record a stop-the-world collection: pause, occupancies, promoted and
    /// allocated estimates, rates and the trace activity.
    pub(crate) fn collection(&mut self, c: Collection) -> Result<()> {
        let end = c.start + c.pause;
        self.record(
            MetricTag::Pause(c.kind),
            c.pause,
            Stamp::Interval { begin: c.start, end },
        )?;
        self.heap_points(
            Some(c.heap),
            [HeapKind::HeapBefore, HeapKind::HeapAfter, HeapKind::HeapCapacity],
            c.start,
            end,
        )?;
        self.heap_points(
            c.young,
            [HeapKind::YoungBefore, HeapKind::YoungAfter, HeapKind::YoungCapacity],
            c.start,
            end,
        )?;
        self.heap_points(
            c.old,
            [HeapKind::OldBefore, HeapKind::OldAfter, HeapKind::OldCapacity],
            c.start,
            end,
        )?;
        self.heap_points(
            c.perm,
            [HeapKind::PermBefore, HeapKind::PermAfter, HeapKind::PermCapacity],
            c.start,
            end,
        )?;

        let promoted = c.young.map(|young| {
            let young_delta = young.before - young.after;
            let heap_delta = c.heap.before - c.heap.after;
            (young_delta - heap_delta).max(0.0)
        });
        if let Some(promoted) = promoted {
            self.record(MetricTag::Derived(DerivedKind::Promoted), promoted, Stamp::None)?;
        }

        let allocated = self.allocated_since_last(&c);
        self.record(MetricTag::Derived(DerivedKind::Allocated), allocated, Stamp::None)?;

        if !self.metrics.has_generated_timestamps() {
            if let Some(prev_end) = self.state.last_collection_end {
                let interval = c.start - prev_end;
                if interval > 0.0 {
                    self.record(
                        MetricTag::Derived(DerivedKind::AllocationRate),
                        allocated / interval,
                        Stamp::Point(c.start),
                    )?;
                    if let Some(promoted) = promoted {
                        self.record(
                            MetricTag::Derived(DerivedKind::PromotionRate),
                            promoted / interval,
                            Stamp::Point(c.start),
                        )?;
                    }
                }
            }
        }

        self.state.heap_after = Some(c.heap.after);
        self.state.young_after = c.young.map(|y| y.after);
        self.state.last_collection_end = Some(end);
        self.window.add_pause(c.pause);
        self.observe_end(end);

        self.activity(c.kind.activity_name(), c.start, c.pause, None)
    }

    /// KB allocated since the previous collection ended.
    ///
    /// Total heap growth is used first; when the heap shrank in between
    /// (a concurrent collection freed space) young generation growth is an
    /// approximation. Zero when neither applies.
    fn allocated_since_last(&self, c: &Collection) -> f64 {
        let by_heap = c.heap.before - self.state.heap_after.unwrap_or(0.0);
        if by_heap >= 0.0 {
            return by_heap;
        }
        if let (Some(young), Some(prev_young)) = (c.young, self.state.young_after) {
            let by_young = young.before - prev_young;
            if by_young >= 0.0 {
                return by_young;
            }
        }
        tracing::debug!(
            source = %self.source_id,
            line = self.line_no,
            heap_before = c.heap.before,
            "parser: allocation estimate unavailable, reporting 0"
        );
        0.0
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Owned counterparts of an [`Extraction`]'s borrows.
    pub(crate) struct Harness {
        pub config: EngineConfig,
        pub metrics: MetricSet,
        pub window: TimingWindow,
        pub state: GcState,
        pub trace: Trace,
        pub line_no: u64,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            let config = EngineConfig::default();
            Self {
                metrics: MetricSet::new(&config),
                window: TimingWindow::new(config.cpu_count),
                state: GcState::new(),
                trace: Trace::new("test"),
                config,
                line_no: 0,
            }
        }

        pub(crate) fn cx(&mut self) -> Extraction<'_> {
            self.line_no += 1;
            Extraction {
                source_id: "test.log",
                line_no: self.line_no,
                config: &self.config,
                metrics: &mut self.metrics,
                window: &mut self.window,
                state: &mut self.state,
                trace: &self.trace,
            }
        }
    }
}
