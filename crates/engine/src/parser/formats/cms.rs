use regex::{Captures, Regex};

use crate::error::Result;
use crate::metrics::{HeapKind, MetricTag, PauseKind, Stamp};
use crate::parser::grammar::{secs, timestamp_prefix};
use crate::parser::traits::{Extraction, LineMatcher};

/// CMS stop-the-world phases: initial mark and remark.
///
/// ```text
/// 5.0: [1 CMS-initial-mark: 1000K(2000K), 0.0012 secs]
/// 5.0: [GC [1 CMS-initial-mark: 1000K(2000K)] 1500K(3000K), 0.0012 secs]
/// 6.0: [GC[YG occupancy: 500 K (1000 K)]6.0: [Rescan (parallel) , 0.01 secs] [1 CMS-remark: 1000K(2000K)] 1500K(3000K), 0.0123 secs]
/// ```
pub struct CmsMatcher {
    initial_mark: Regex,
    remark: Regex,
}

/// `<old>K(<cap>K)` optionally followed by `] <heap>K(<cap>K)`.
fn generation_tail() -> String {
    format!(
        r":\s*(?P<old_used>\d+)K?\((?P<old_cap>\d+)K?\)(?:\]\s*(?P<heap_used>\d+)K?\((?P<heap_cap>\d+)K?\))?,\s*{}\]",
        secs("secs")
    )
}

impl CmsMatcher {
    pub fn new() -> Result<Self> {
        let initial_mark = format!(
            r"{ts}(?:\[GC\s*)?\[1 (?:AS)?CMS-initial-mark{tail}",
            ts = timestamp_prefix(),
            tail = generation_tail(),
        );
        let remark = format!(
            r"{ts}(?:\[GC\s*\[YG occupancy.*?)?\[1 (?:AS)?CMS-remark{tail}",
            ts = timestamp_prefix(),
            tail = generation_tail(),
        );
        Ok(Self {
            initial_mark: Regex::new(&initial_mark)?,
            remark: Regex::new(&remark)?,
        })
    }

    fn extract(&self, caps: &Captures<'_>, kind: PauseKind, cx: &mut Extraction<'_>) -> Result<()> {
        let pause = cx.capture_number(caps, "secs")?;
        let old_used = cx.capture_size(caps, "old_used")?;
        let old_cap = cx.capture_size(caps, "old_cap")?;
        let heap = match caps.name("heap_used") {
            Some(_) => Some((
                cx.capture_size(caps, "heap_used")?,
                cx.capture_size(caps, "heap_cap")?,
            )),
            None => None,
        };
        let start = cx.capture_timestamp(caps)?;
        let end = start + pause;

        cx.record(MetricTag::Pause(kind), pause, Stamp::Interval { begin: start, end })?;
        cx.record(MetricTag::Heap(HeapKind::OldBefore), old_used, Stamp::Point(start))?;
        cx.record(MetricTag::Heap(HeapKind::OldCapacity), old_cap, Stamp::Point(start))?;
        if let Some((used, cap)) = heap {
            cx.record(MetricTag::Heap(HeapKind::HeapBefore), used, Stamp::Point(start))?;
            cx.record(MetricTag::Heap(HeapKind::HeapCapacity), cap, Stamp::Point(start))?;
        }
        cx.window.add_pause(pause);
        cx.observe_end(end);

        if kind == PauseKind::Remark {
            // a log starting mid-cycle still gets Initial Mark before Remark
            cx.trace.ensure_kind(PauseKind::InitialMark.activity_name())?;
        }
        cx.activity(kind.activity_name(), start, pause, None)
    }
}

impl LineMatcher for CmsMatcher {
    fn name(&self) -> &'static str {
        "cms"
    }

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        if let Some(caps) = self.initial_mark.captures(line) {
            self.extract(&caps, PauseKind::InitialMark, cx)?;
            return Ok(true);
        }
        if let Some(caps) = self.remark.captures(line) {
            self.extract(&caps, PauseKind::Remark, cx)?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::context::testing::Harness;

    #[test]
    fn test_initial_mark_short_form() {
        let m = CmsMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m
            .try_match("5.0: [1 CMS-initial-mark: 1000K(2000K), 0.0012 secs]", &mut h.cx())
            .unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::InitialMark)).count, 1);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::OldCapacity)).max, 2000.0);
        assert!(h.metrics.store(MetricTag::Heap(HeapKind::HeapBefore)).is_none());
    }

    #[test]
    fn test_initial_mark_hotspot_form() {
        let m = CmsMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m
            .try_match(
                "5.0: [GC [1 CMS-initial-mark: 1000K(2000K)] 1500K(3000K), 0.0012 secs]",
                &mut h.cx()
            )
            .unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::HeapCapacity)).max, 3000.0);
    }

    #[test]
    fn test_remark_registers_initial_mark_first() {
        let m = CmsMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "6.0: [GC[YG occupancy: 500 K (1000 K)]6.0: [Rescan (parallel) , 0.01 secs] [1 CMS-remark: 1000K(2000K)] 1500K(3000K), 0.0123 secs]";
        assert!(m.try_match(line, &mut h.cx()).unwrap());

        assert_eq!(h.trace.kind_id("Initial Mark"), Some(0));
        assert_eq!(h.trace.kind_id("Remark"), Some(1));
        assert_eq!(h.trace.len(0), Some(0));
        assert_eq!(h.trace.len(1), Some(1));
    }

    #[test]
    fn test_remark_after_initial_mark_keeps_ids() {
        let m = CmsMatcher::new().unwrap();
        let mut h = Harness::new();
        m.try_match("5.0: [1 CMS-initial-mark: 1000K(2000K), 0.0012 secs]", &mut h.cx())
            .unwrap();
        m.try_match("6.0: [1 CMS-remark: 1000K(2000K), 0.05 secs]", &mut h.cx())
            .unwrap();
        assert_eq!(h.trace.kind_id("Remark"), Some(1));
        assert_eq!(h.trace.all_len(), 2);
        assert!((h.metrics.total_pause_time() - 0.0512).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_lines_rejected() {
        let m = CmsMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(!m.try_match("5.0: [CMS-concurrent-mark-start]", &mut h.cx()).unwrap());
        assert!(!m
            .try_match("5.0: [CMS-concurrent-mark: 1.200/1.350 secs]", &mut h.cx())
            .unwrap());
    }
}
