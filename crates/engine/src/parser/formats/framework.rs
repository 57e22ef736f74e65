use regex::Regex;

use crate::error::Result;
use crate::metrics::PauseKind;
use crate::parser::context::Collection;
use crate::parser::grammar::{cause, inner_timestamp, occupancy, secs, timestamp_prefix};
use crate::parser::traits::{Extraction, LineMatcher};

/// Serial and ParNew collector output (`-XX:+PrintGCDetails`).
///
/// ```text
/// 12.345: [GC 12.345: [DefNew: 3968K->447K(4032K), 0.0051010 secs] 3968K->1273K(12928K), 0.0052050 secs]
/// 20.1: [Full GC 20.1: [Tenured: 8000K->5000K(8192K), 0.1 secs] 11968K->5000K(12224K), [Perm : 1000K->1000K(2000K)], 0.11 secs]
/// ```
pub struct FrameworkMatcher {
    young: Regex,
    full: Regex,
}

impl FrameworkMatcher {
    pub fn new() -> Result<Self> {
        let young = format!(
            r"{ts}\[GC{cause}\s*{inner}\[(?P<gen>DefNew|ParNew)(?P<failed>\s*\(promotion failed\))?:\s*{young},\s*{young_secs}\]\s*{heap},\s*{secs}\]",
            ts = timestamp_prefix(),
            cause = cause(),
            inner = inner_timestamp(),
            young = occupancy("young"),
            young_secs = secs("young_secs"),
            heap = occupancy("heap"),
            secs = secs("secs"),
        );
        let full = format!(
            r"{ts}\[Full GC{cause}\s*{inner}\[(?P<gen>Tenured|CMS):\s*{old},\s*{old_secs}\]\s*{heap},\s*(?:\[(?:CMS\s+)?Perm\s*:\s*{perm}\],\s*)?{secs}\]",
            ts = timestamp_prefix(),
            cause = cause(),
            inner = inner_timestamp(),
            old = occupancy("old"),
            old_secs = secs("old_secs"),
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

impl LineMatcher for FrameworkMatcher {
    fn name(&self) -> &'static str {
        "framework"
    }

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        if let Some(caps) = self.young.captures(line) {
            let kind = if caps.name("failed").is_some() {
                PauseKind::PromotionFailed
            } else {
                PauseKind::YoungGc
            };
            let pause = cx.capture_number(&caps, "secs")?;
            let heap = cx.occupancy(&caps, ["heap_before", "heap_after", "heap_cap"])?;
            let young = cx.occupancy(&caps, ["young_before", "young_after", "young_cap"])?;
            let start = cx.capture_timestamp(&caps)?;
            if let Some(heap) = heap {
                cx.collection(Collection {
                    kind,
                    start,
                    pause,
                    heap,
                    young,
                    old: None,
                    perm: None,
                })?;
            }
            return Ok(true);
        }

        if let Some(caps) = self.full.captures(line) {
            let pause = cx.capture_number(&caps, "secs")?;
            let heap = cx.occupancy(&caps, ["heap_before", "heap_after", "heap_cap"])?;
            let old = cx.occupancy(&caps, ["old_before", "old_after", "old_cap"])?;
            let perm = cx.occupancy(&caps, ["perm_before", "perm_after", "perm_cap"])?;
            let start = cx.capture_timestamp(&caps)?;
            if let Some(heap) = heap {
                cx.collection(Collection {
                    kind: PauseKind::FullGc,
                    start,
                    pause,
                    heap,
                    young: None,
                    old,
                    perm,
                })?;
            }
            return Ok(true);
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{HeapKind, MetricTag};
    use crate::parser::context::testing::Harness;

    const YOUNG: &str = "12.345: [GC 12.345: [DefNew: 3968K->447K(4032K), 0.0051010 secs] 3968K->1273K(12928K), 0.0052050 secs]";
    const FULL: &str = "20.1: [Full GC 20.1: [Tenured: 8000K->5000K(8192K), 0.1 secs] 11968K->5000K(12224K), [Perm : 1000K->1000K(2000K)], 0.11 secs]";

    #[test]
    fn test_young_collection() {
        let m = FrameworkMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m.try_match(YOUNG, &mut h.cx()).unwrap());

        let pause = h.metrics.summary(MetricTag::Pause(PauseKind::YoungGc));
        assert_eq!(pause.count, 1);
        assert!((pause.sum - 0.0052050).abs() < 1e-12);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::YoungAfter)).max, 447.0);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::HeapCapacity)).max, 12928.0);

        let activity = &h.trace.all_activities(0..1)[0];
        assert_eq!(activity.kind(), "Young GC");
        assert_eq!(activity.start(), 12.345);
    }

    #[test]
    fn test_par_new_promotion_failed() {
        let m = FrameworkMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "3.0: [GC 3.0: [ParNew (promotion failed): 3968K->3968K(4032K), 0,0100 secs] 11968K->11968K(12224K), 0,0200 secs]";
        assert!(m.try_match(line, &mut h.cx()).unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::PromotionFailed)).count, 1);
        assert_eq!(h.trace.kind_id("Promotion Failed"), Some(0));
    }

    #[test]
    fn test_full_collection_with_perm() {
        let m = FrameworkMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m.try_match(FULL, &mut h.cx()).unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::FullGc)).count, 1);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::OldAfter)).max, 5000.0);
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::PermCapacity)).max, 2000.0);
    }

    #[test]
    fn test_young_collection_with_cause() {
        let m = FrameworkMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "7.5: [GC (Allocation Failure) 7.5: [DefNew: 3968K->447K(4032K), 0.005 secs] 3968K->1273K(12928K), 0.005 secs] [Times: user=0.01 sys=0.00, real=0.01 secs]";
        assert!(m.try_match(line, &mut h.cx()).unwrap());
    }

    #[test]
    fn test_full_collection_cms_generation() {
        let m = FrameworkMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "40.0: [Full GC 40.0: [CMS: 8000K->5000K(8192K), 0.5 secs] 11968K->5000K(12224K), [CMS Perm : 1000K->900K(2000K)], 0.51 secs]";
        assert!(m.try_match(line, &mut h.cx()).unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::PermAfter)).max, 900.0);
    }

    #[test]
    fn test_other_grammars_rejected() {
        let m = FrameworkMatcher::new().unwrap();
        let mut h = Harness::new();
        for line in [
            "[GC [PSYoungGen: 7680K->1016K(8960K)] 7680K->5432K(29440K), 0.0081 secs]",
            "[GC 3968K->1273K(12928K), 0.0052 secs]",
            "5.0: [CMS-concurrent-mark: 1.200/1.350 secs]",
            "YoungGC 1.250 0.012",
        ] {
            assert!(!m.try_match(line, &mut h.cx()).unwrap(), "{}", line);
        }
        assert!(h.trace.is_empty());
    }

    #[test]
    fn test_oversized_field_is_malformed() {
        let m = FrameworkMatcher::new().unwrap();
        let mut h = Harness::new();
        let line = "1.0: [GC 1.0: [DefNew: 99999999999999999999999K->447K(4032K), 0.005 secs] 3968K->1273K(12928K), 0.005 secs]";
        assert!(m.try_match(line, &mut h.cx()).is_err());
    }
}
