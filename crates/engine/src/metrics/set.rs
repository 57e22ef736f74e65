use std::collections::BTreeMap;

use serde::Serialize;

use super::accumulator::{Accumulator, Comparison, Summary};
use super::store::{DataStore, Stamp};
use super::tag::{DerivedKind, MetricTag, PauseKind};
use crate::conf::EngineConfig;
use crate::error::Result;

/// Marker for a source begin/end that has not been observed yet.
pub const UNKNOWN_TIMESTAMP: f64 = -1.0;

/// Per-run statistics: one [`DataStore`] per channel plus the bookkeeping
/// that keeps timestamps of concatenated sources apart.
#[derive(Debug, Clone)]
pub struct MetricSet {
    stores: BTreeMap<MetricTag, DataStore>,
    retain: bool,
    gap: f64,
    min_gap: f64,
    offset: f64,
    source_begin: f64,
    source_end: f64,
    total_elapsed: f64,
    closed_sources: u32,
    generated_timestamps: bool,
}

impl MetricSet {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_gaps(
            config.effective_source_gap(),
            config.min_source_gap_secs,
            config.retain_samples,
        )
    }

    pub fn with_gaps(gap: f64, min_gap: f64, retain: bool) -> Self {
        Self {
            stores: BTreeMap::new(),
            retain,
            gap: gap.max(min_gap),
            min_gap,
            offset: 0.0,
            source_begin: UNKNOWN_TIMESTAMP,
            source_end: UNKNOWN_TIMESTAMP,
            total_elapsed: 0.0,
            closed_sources: 0,
            generated_timestamps: false,
        }
    }

    // ── Samples ──────────────────────────────────────────────────

    pub fn record(&mut self, tag: MetricTag, value: f64, stamp: Stamp) -> Result<()> {
        let retain = self.retain;
        self.stores
            .entry(tag)
            .or_insert_with(|| DataStore::new(tag, retain))
            .add(value, stamp)
    }

    pub fn store(&self, tag: MetricTag) -> Option<&DataStore> {
        self.stores.get(&tag)
    }

    /// Running statistics of a channel (empty when nothing was recorded).
    pub fn stats(&self, tag: MetricTag) -> Accumulator {
        self.stores
            .get(&tag)
            .map(|s| *s.stats())
            .unwrap_or_default()
    }

    pub fn summary(&self, tag: MetricTag) -> Summary {
        self.stats(tag).summary()
    }

    /// Channels with at least one sample, in tag order.
    pub fn stores(&self) -> impl Iterator<Item = &DataStore> {
        self.stores.values().filter(|s| !s.stats().is_empty())
    }

    /// Sum of every sample recorded on `tag`.
    pub fn cumulative(&self, tag: MetricTag) -> f64 {
        self.stats(tag).sum()
    }

    /// KB allocated so far, as estimated by the collection matchers.
    pub fn cumulative_allocation(&self) -> f64 {
        self.cumulative(MetricTag::Derived(DerivedKind::Allocated))
    }

    /// Seconds spent in stop-the-world pauses so far.
    pub fn total_pause_time(&self) -> f64 {
        PauseKind::ALL
            .into_iter()
            .map(|k| self.cumulative(MetricTag::Pause(k)))
            .sum()
    }

    // ── Source timeline ──────────────────────────────────────────

    /// Start a new source. Its begin stays unknown until the first real
    /// timestamp shows up unless it is known to start at time zero.
    pub fn begin_source(&mut self, starts_at_zero: bool) {
        if starts_at_zero {
            self.source_begin = self.offset;
            self.source_end = self.offset;
        } else {
            self.source_begin = UNKNOWN_TIMESTAMP;
            self.source_end = UNKNOWN_TIMESTAMP;
        }
    }

    /// Shift a timestamp read from the current source onto the run's timeline.
    pub fn adjust_timestamp(&mut self, raw: f64) -> f64 {
        let ts = raw + self.offset;
        self.observe(ts);
        ts
    }

    /// Extend the current source's span to cover `ts` (already adjusted).
    pub fn observe(&mut self, ts: f64) {
        if self.source_begin < 0.0 {
            self.source_begin = ts;
        }
        if ts > self.source_end {
            self.source_end = ts;
        }
    }

    /// Close the current source: add its span to the elapsed total and move
    /// the offset to the next gap multiple past its end.
    pub fn end_of_source(&mut self) {
        if self.source_begin >= 0.0 && self.source_end >= self.source_begin {
            self.total_elapsed += self.source_end - self.source_begin;
        }
        if self.source_end >= 0.0 {
            let threshold = self.source_end + self.min_gap - 1.0;
            self.offset = (threshold / self.gap).ceil() * self.gap;
        }
        self.closed_sources += 1;
        tracing::debug!(
            closed_sources = self.closed_sources,
            total_elapsed = self.total_elapsed,
            next_offset = self.offset,
            "metrics: source closed"
        );
        self.source_begin = UNKNOWN_TIMESTAMP;
        self.source_end = UNKNOWN_TIMESTAMP;
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn source_begin(&self) -> f64 {
        self.source_begin
    }

    pub fn source_end(&self) -> f64 {
        self.source_end
    }

    /// Elapsed seconds of all closed sources plus the open one.
    pub fn total_elapsed(&self) -> f64 {
        let open = if self.source_begin >= 0.0 && self.source_end >= self.source_begin {
            self.source_end - self.source_begin
        } else {
            0.0
        };
        self.total_elapsed + open
    }

    pub fn closed_sources(&self) -> u32 {
        self.closed_sources
    }

    pub fn mark_generated_timestamps(&mut self) {
        if !self.generated_timestamps {
            tracing::debug!("metrics: synthesizing timestamps, rate channels disabled");
        }
        self.generated_timestamps = true;
    }

    /// True once any timestamp of the run was synthesized; wall-clock
    /// based rates are meaningless from then on.
    pub fn has_generated_timestamps(&self) -> bool {
        self.generated_timestamps
    }

    // ── Reports ──────────────────────────────────────────────────

    /// Percent change of every channel present in either run.
    pub fn compare(&self, reference: &MetricSet) -> Vec<ChannelComparison> {
        let mut tags: Vec<MetricTag> = reference
            .stores()
            .map(DataStore::tag)
            .chain(self.stores().map(DataStore::tag))
            .collect();
        tags.sort();
        tags.dedup();

        tags.into_iter()
            .map(|tag| ChannelComparison {
                tag,
                reference: reference.summary(tag),
                candidate: self.summary(tag),
                change: Comparison::between(&reference.stats(tag), &self.stats(tag)),
            })
            .collect()
    }

    pub fn report(&self) -> MetricsReport {
        let elapsed = self.total_elapsed();
        let pause = self.total_pause_time();
        let gc_overhead_percent = if elapsed > 0.0 && !self.generated_timestamps {
            Some((pause / elapsed * 100.0).min(100.0))
        } else {
            None
        };

        MetricsReport {
            sources: self.closed_sources,
            total_elapsed_secs: elapsed,
            total_pause_secs: pause,
            gc_overhead_percent,
            generated_timestamps: self.generated_timestamps,
            channels: self
                .stores()
                .map(|s| ChannelReport {
                    tag: s.tag(),
                    slug: s.tag().slug(),
                    label: s.tag().label(),
                    unit: s.tag().unit(),
                    summary: s.summary(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelComparison {
    pub tag: MetricTag,
    pub reference: Summary,
    pub candidate: Summary,
    pub change: Comparison,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub tag: MetricTag,
    pub slug: String,
    pub label: String,
    pub unit: &'static str,
    pub summary: Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub sources: u32,
    pub total_elapsed_secs: f64,
    pub total_pause_secs: f64,
    pub gc_overhead_percent: Option<f64>,
    pub generated_timestamps: bool,
    pub channels: Vec<ChannelReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tag::HeapKind;

    fn young(ms: &mut MetricSet, begin: f64, secs: f64) {
        ms.record(
            MetricTag::Pause(PauseKind::YoungGc),
            secs,
            Stamp::Interval { begin, end: begin + secs },
        )
        .unwrap();
    }

    // ── Source offsets ───────────────────────────────────────────

    #[test]
    fn test_second_source_starts_at_next_gap_multiple() {
        let mut ms = MetricSet::with_gaps(600.0, 300.0, true);
        ms.begin_source(true);
        ms.adjust_timestamp(12.5);
        ms.adjust_timestamp(100.0);
        ms.end_of_source();

        ms.begin_source(true);
        let first = ms.adjust_timestamp(0.0);
        assert_eq!(first, 600.0);
        assert!(first >= 100.0 + 299.0);
        assert_eq!(first % 600.0, 0.0);
    }

    #[test]
    fn test_offset_skips_a_multiple_when_end_is_close() {
        let mut ms = MetricSet::with_gaps(600.0, 300.0, true);
        ms.begin_source(true);
        ms.adjust_timestamp(450.0);
        ms.end_of_source();
        assert_eq!(ms.offset(), 1200.0);
    }

    #[test]
    fn test_elapsed_accumulates_across_sources() {
        let mut ms = MetricSet::with_gaps(600.0, 300.0, true);
        ms.begin_source(true);
        ms.adjust_timestamp(100.0);
        ms.end_of_source();
        ms.begin_source(true);
        ms.adjust_timestamp(50.0);
        ms.end_of_source();
        assert_eq!(ms.closed_sources(), 2);
        assert!((ms.total_elapsed() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_source_not_starting_at_zero_has_unknown_begin() {
        let mut ms = MetricSet::with_gaps(600.0, 300.0, true);
        ms.begin_source(false);
        assert_eq!(ms.source_begin(), UNKNOWN_TIMESTAMP);
        ms.adjust_timestamp(3600.0);
        ms.adjust_timestamp(3660.0);
        assert_eq!(ms.source_begin(), 3600.0);
        assert!((ms.total_elapsed() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_never_below_minimum() {
        let mut ms = MetricSet::with_gaps(100.0, 300.0, true);
        ms.begin_source(true);
        ms.adjust_timestamp(10.0);
        ms.end_of_source();
        // gap is raised to 300, and 10 + 299 needs the second multiple
        assert_eq!(ms.offset(), 600.0);
    }

    // ── Samples and reports ──────────────────────────────────────

    #[test]
    fn test_total_pause_time_sums_pause_channels() {
        let mut ms = MetricSet::with_gaps(600.0, 300.0, false);
        young(&mut ms, 1.0, 0.010);
        young(&mut ms, 2.0, 0.030);
        ms.record(
            MetricTag::Pause(PauseKind::FullGc),
            0.5,
            Stamp::Interval { begin: 3.0, end: 3.5 },
        )
        .unwrap();
        assert!((ms.total_pause_time() - 0.54).abs() < 1e-9);
    }

    #[test]
    fn test_report_gc_overhead() {
        let mut ms = MetricSet::with_gaps(600.0, 300.0, false);
        ms.begin_source(true);
        young(&mut ms, 1.0, 1.0);
        ms.adjust_timestamp(10.0);
        let report = ms.report();
        assert_eq!(report.channels.len(), 1);
        assert!((report.gc_overhead_percent.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_has_no_overhead_with_generated_timestamps() {
        let mut ms = MetricSet::with_gaps(600.0, 300.0, false);
        ms.begin_source(true);
        young(&mut ms, 1.0, 1.0);
        ms.observe(10.0);
        ms.mark_generated_timestamps();
        assert!(ms.report().gc_overhead_percent.is_none());
    }

    #[test]
    fn test_compare_covers_union_of_channels() {
        let mut reference = MetricSet::with_gaps(600.0, 300.0, false);
        young(&mut reference, 1.0, 0.010);
        let mut candidate = MetricSet::with_gaps(600.0, 300.0, false);
        young(&mut candidate, 1.0, 0.020);
        candidate
            .record(MetricTag::Heap(HeapKind::HeapAfter), 2048.0, Stamp::Point(1.0))
            .unwrap();

        let rows = candidate.compare(&reference);
        assert_eq!(rows.len(), 2);
        let young_row = rows
            .iter()
            .find(|r| r.tag == MetricTag::Pause(PauseKind::YoungGc))
            .unwrap();
        assert!((young_row.change.mean - 100.0).abs() < 1e-9);
    }
}
