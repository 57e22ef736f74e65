use regex::Regex;

use crate::error::Result;
use crate::metrics::PauseKind;
use crate::parser::context::Collection;
use crate::parser::grammar::{cause, occupancy, secs, timestamp_prefix};
use crate::parser::traits::{Extraction, LineMatcher};

/// Parallel scavenge / parallel old output with named generations.
///
/// ```text
/// 1.234: [GC [PSYoungGen: 7680K->1016K(8960K)] 7680K->5432K(29440K), 0.0081 secs]
/// 2.5: [Full GC [PSYoungGen: 1016K->0K(8960K)] [ParOldGen: 4416K->5308K(20480K)] 5432K->5308K(29440K) [PSPermGen: 2564K->2563K(21248K)], 0.0429 secs]
/// ```
pub struct ParallelMatcher {
    young: Regex,
    full: Regex,
}

impl ParallelMatcher {
    pub fn new() -> Result<Self> {
        let young = format!(
            r"{ts}\[GC{cause}\s*\[PSYoungGen:\s*{young}\]\s*{heap},\s*{secs}\]",
            ts = timestamp_prefix(),
            cause = cause(),
            young = occupancy("young"),
            heap = occupancy("heap"),
            secs = secs("secs"),
        );
        let full = format!(
            r"{ts}\[Full GC{cause}\s*\[PSYoungGen:\s*{young}\]\s*\[(?P<old_gen>PSOldGen|ParOldGen):\s*{old}\]\s*{heap},?\s*(?:\[PSPermGen:\s*{perm}\],?\s*)?{secs}\]",
            ts = timestamp_prefix(),
            cause = cause(),
            young = occupancy("young"),
            old = occupancy("old"),
            heap = occupancy("heap"),
            perm = occupancy("perm"),
            secs = secs("secs"),
        );
        Ok(Self {
            young: Regex::new(&young)?,
            full: Regex::new(&full)?,
        })
    }
}

impl LineMatcher for ParallelMatcher {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        let (caps, kind) = match self.young.captures(line) {
            Some(caps) => (caps, PauseKind::YoungGc),
            None => match self.full.captures(line) {
                Some(caps) => (caps, PauseKind::FullGc),
                None => return Ok(false),
            },
        };

        let pause = cx.capture_number(&caps, "secs")?;
        let heap = cx.occupancy(&caps, ["heap_before", "heap_after", "heap_cap"])?;
        let young = cx.occupancy(&caps, ["young_before", "young_after", "young_cap"])?;
        let old = cx.occupancy(&caps, ["old_before", "old_after", "old_cap"])?;
        let perm = cx.occupancy(&caps, ["perm_before", "perm_after", "perm_cap"])?;
        let start = cx.capture_timestamp(&caps)?;

        if let Some(heap) = heap {
            cx.collection(Collection {
                kind,
                start,
                pause,
                heap,
                young,
                old,
                perm,
            })?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{HeapKind, MetricTag};
    use crate::parser::context::testing::Harness;

    #[test]
    fn test_young_collection() {
        let m = ParallelMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "1.234: [GC [PSYoungGen: 7680K->1016K(8960K)] 7680K->5432K(29440K), 0.0081 secs]";
        assert!(m.try_match(line, &mut h.cx()).unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::YoungGc)).count, 1);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::YoungBefore)).max, 7680.0);
        // young freed 6664, heap freed 2248
        let promoted = h.metrics.summary(MetricTag::Derived(crate::metrics::DerivedKind::Promoted));
        assert_eq!(promoted.max, 4416.0);
    }

    #[test]
    fn test_full_collection_with_cause_and_perm() {
        let m = ParallelMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "2.5: [Full GC (System) [PSYoungGen: 1016K->0K(8960K)] [ParOldGen: 4416K->5308K(20480K)] 5432K->5308K(29440K) [PSPermGen: 2564K->2563K(21248K)], 0.0429 secs]";
        assert!(m.try_match(line, &mut h.cx()).unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::FullGc)).count, 1);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::OldAfter)).max, 5308.0);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::PermBefore)).max, 2564.0);
        assert_eq!(h.trace.kind_id("Full GC"), Some(0));
    }

    #[test]
    fn test_full_collection_ps_old_gen_without_perm() {
        let m = ParallelMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "[Full GC [PSYoungGen: 1016K->0K(8960K)] [PSOldGen: 4416K->5308K(20480K)] 5432K->5308K(29440K), 0.0429 secs]";
        assert!(m.try_match(line, &mut h.cx()).unwrap());
        assert!(h.metrics.store(MetricTag::Heap(HeapKind::PermBefore)).is_none());
        assert!(h.metrics.has_generated_timestamps());
    }

    #[test]
    fn test_framework_lines_rejected() {
        let m = ParallelMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "12.345: [GC 12.345: [DefNew: 3968K->447K(4032K), 0.0051010 secs] 3968K->1273K(12928K), 0.0052050 secs]";
        assert!(!m.try_match(line, &mut h.cx()).unwrap());
    }
}
