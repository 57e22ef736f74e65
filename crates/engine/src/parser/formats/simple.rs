use regex::Regex;

use crate::error::Result;
use crate::metrics::{HeapKind, MetricTag, PauseKind, Stamp};
use crate::parser::grammar::NUM;
use crate::parser::traits::{Extraction, LineMatcher};

/// Whitespace separated trace lines:
///
/// ```text
/// <name> <start> <duration>
/// <name> <start> <duration> <overhead%>
/// <name> <start> <duration> <overhead%> <spaceBefore> <spaceAfter>
/// ```
///
/// Three fields describe a stop-the-world activity, four or six a
/// concurrent one. CamelCase names are split into words.
pub struct SimpleMatcher {
    pattern: Regex,
}

impl SimpleMatcher {
    pub fn new() -> Result<Self> {
        let pattern = format!(
            r"^\s*(?P<name>[A-Za-z][A-Za-z0-9_\-]*)\s+(?P<start>{num})\s+(?P<duration>{num})(?:\s+(?P<overhead>{num})(?:\s+(?P<before>\d+)\s+(?P<after>\d+))?)?\s*$",
            num = NUM,
        );
        Ok(Self {
            pattern: Regex::new(&pattern)?,
        })
    }
}

/// `YoungGC` → `Young GC`, `GCPause` → `GC Pause`.
pub fn split_camel_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

impl LineMatcher for SimpleMatcher {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        let Some(caps) = self.pattern.captures(line) else {
            return Ok(false);
        };
        let name = split_camel_case(&caps["name"]);
        let start = cx.capture_number(&caps, "start")?;
        let duration = cx.capture_number(&caps, "duration")?;
        let overhead = match caps.name("overhead") {
            Some(m) => Some(cx.number("overhead", m.as_str())?),
            None => None,
        };
        let spaces = match (caps.name("before"), caps.name("after")) {
            (Some(before), Some(after)) => Some((
                cx.size("before", before.as_str())?,
                cx.size("after", after.as_str())?,
            )),
            _ => None,
        };

        let start = cx.explicit_timestamp(start);
        let end = start + duration;
        cx.observe_end(end);

        if overhead.is_none() {
            if let Some(kind) = PauseKind::from_activity_name(&name) {
                cx.record(MetricTag::Pause(kind), duration, Stamp::Interval { begin: start, end })?;
                cx.window.add_pause(duration);
            }
        }
        if let Some((before, after)) = spaces {
            cx.record(MetricTag::Heap(HeapKind::HeapBefore), before, Stamp::Point(start))?;
            cx.record(MetricTag::Heap(HeapKind::HeapAfter), after, Stamp::Point(end))?;
        }

        cx.activity(&name, start, duration, overhead)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::context::testing::Harness;

    #[test]
    fn test_split_camel_case() {
        assert_eq!(split_camel_case("YoungGC"), "Young GC");
        assert_eq!(split_camel_case("FullGC"), "Full GC");
        assert_eq!(split_camel_case("GCPause"), "GC Pause");
        assert_eq!(split_camel_case("Remark"), "Remark");
        assert_eq!(split_camel_case("CMS-concurrent-mark"), "CMS-concurrent-mark");
    }

    #[test]
    fn test_three_fields_is_stop_the_world() {
        let m = SimpleMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m.try_match("YoungGC 1.250 0.012", &mut h.cx()).unwrap());

        assert_eq!(h.trace.kind_id("Young GC"), Some(0));
        let a = &h.trace.activities(0, 0..1).unwrap()[0];
        assert_eq!(a.kind(), "Young GC");
        assert_eq!(a.start(), 1.25);
        assert_eq!(a.duration(), 0.012);
        assert!(a.is_stw());
        assert_eq!(a.overhead_percent(), 100.0);
        assert_eq!(h.metrics.summary(MetricTag::Pause(PauseKind::YoungGc)).count, 1);
    }

    #[test]
    fn test_four_fields_is_concurrent() {
        let m = SimpleMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m.try_match("FullGC 2.0 0.5 87.5", &mut h.cx()).unwrap());
        let a = &h.trace.all_activities(0..1)[0];
        assert_eq!(a.kind(), "Full GC");
        assert!(!a.is_stw());
        assert_eq!(a.overhead_percent(), 87.5);
        assert!(h.metrics.store(MetricTag::Pause(PauseKind::FullGc)).is_none());
    }

    #[test]
    fn test_six_fields_record_space() {
        let m = SimpleMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m.try_match("Sweep 4.0 1.0 50 8000 3000", &mut h.cx()).unwrap());
        assert_eq!(h.metrics.summary(MetricTag::Heap(HeapKind::HeapAfter)).max, 3000.0);
    }

    #[test]
    fn test_other_field_counts_rejected() {
        let m = SimpleMatcher::new().unwrap();
        let mut h = Harness::new();
        for line in [
            "YoungGC 1.0",
            "YoungGC 1.0 0.1 50 8000",
            "YoungGC 1.0 0.1 50 8000 3000 7",
            "Application time: 0.1234 seconds",
        ] {
            assert!(!m.try_match(line, &mut h.cx()).unwrap(), "{}", line);
        }
    }

    #[test]
    fn test_overhead_out_of_range_is_skipped_not_fatal() {
        let m = SimpleMatcher::new().unwrap();
        let mut h = Harness::new();
        assert!(m.try_match("Sweep 1.0 0.5 150", &mut h.cx()).unwrap());
        assert!(h.trace.is_empty());
    }
}
