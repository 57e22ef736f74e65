use regex::Regex;

use crate::error::Result;
use crate::metrics::PauseKind;
use crate::parser::context::Collection;
use crate::parser::grammar::{cause, occupancy, secs, timestamp_prefix};
use crate::parser::traits::{Extraction, LineMatcher};

/// Plain `-verbose:gc` output.
///
/// ```text
/// [GC 3968K->1273K(12928K), 0.0052050 secs]
/// 8.0: [Full GC (System) 3968K->1273K(12928K), 0.0452 secs]
/// ```
pub struct VerboseMatcher {
    pattern: Regex,
}

impl VerboseMatcher {
    pub fn new() -> Result<Self> {
        let pattern = format!(
            r"{ts}\[(?P<kind>Full GC|GC){cause}\s+{heap},\s*{secs}\]",
            ts = timestamp_prefix(),
            cause = cause(),
            heap = occupancy("heap"),
            secs = secs("secs"),
        );
        Ok(Self {
            pattern: Regex::new(&pattern)?,
        })
    }
}

impl LineMatcher for VerboseMatcher {
    fn name(&self) -> &'static str {
        "verbose"
    }

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        let Some(caps) = self.pattern.captures(line) else {
            return Ok(false);
        };
        let kind = match &caps["kind"] {
            "Full GC" => PauseKind::FullGc,
            _ => PauseKind::YoungGc,
        };
        let pause = cx.capture_number(&caps, "secs")?;
        let heap = cx.occupancy(&caps, ["heap_before", "heap_after", "heap_cap"])?;
        let start = cx.capture_timestamp(&caps)?;

        if let Some(heap) = heap {
            cx.collection(Collection {
                kind,
                start,
                pause,
                heap,
                young: None,
                old: None,
                perm: None,
            })?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{DerivedKind, MetricTag};
    use crate::parser::context::testing::Harness;

    #[test]
    fn test_young_without_timestamp() {
        let m = VerboseMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m.try_match("[GC 3968K->1273K(12928K), 0.0052050 secs]", &mut h.cx()).unwrap());
        assert!(m.try_match("[GC 4000K->1300K(12928K), 0.0050000 secs]", &mut h.cx()).unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::YoungGc)).count, 2);
        assert!(h.metrics.has_generated_timestamps());
        // no real clock, no rates
        assert!(h.metrics.store(MetricTag::Derived(DerivedKind::AllocationRate)).is_none());
        assert_eq!(h.trace.all_activities(0..2)[1].start(), 1.0);
    }

    #[test]
    fn test_full_with_cause() {
        let m = VerboseMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m
            .try_match("8.0: [Full GC (System) 3968K->1273K(12928K), 0.0452 secs]", &mut h.cx())
            .unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::FullGc)).count, 1);
        assert!(!h.metrics.has_generated_timestamps());
    }

    #[test]
    fn test_detailed_lines_rejected() {
        let m = VerboseMatcher::new().unwrap();
        let mut h = Harness::new();
        for line in [
            "[GC [PSYoungGen: 7680K->1016K(8960K)] 7680K->5432K(29440K), 0.0081 secs]",
            "5.0: [GC [1 CMS-initial-mark: 1000K(2000K)] 1500K(3000K), 0.0012 secs]",
            "12.345: [GC 12.345: [DefNew: 3968K->447K(4032K), 0.0051010 secs] 3968K->1273K(12928K), 0.0052050 secs]",
        ] {
            assert!(!m.try_match(line, &mut h.cx()).unwrap(), "{}", line);
        }
    }
}
