use regex::Regex;

use crate::error::Result;
use crate::metrics::{CompactionPhase, MetricTag, Stamp};
use crate::parser::grammar::{secs, timestamp_prefix};
use crate::parser::traits::{Extraction, LineMatcher};

/// One parallel-old compaction sub-phase (`-XX:+PrintParallelOldGCPhaseTimes`).
///
/// ```text
/// 3.1: [par mark: 0.0123 secs]
/// [dense prefix task setup, 0.0000050 secs]
/// ```
///
/// Every phase of [`CompactionPhase::ALL`] gets its own matcher built from
/// the same template, so the dispatcher can rank them independently.
pub struct CompactionPhaseMatcher {
    phase: CompactionPhase,
    pattern: Regex,
}

impl CompactionPhaseMatcher {
    pub fn new(phase: CompactionPhase) -> Result<Self> {
        let pattern = format!(
            r"{ts}\[{name}[:,]\s*{secs}\]",
            ts = timestamp_prefix(),
            name = regex::escape(phase.log_name()),
            secs = secs("secs"),
        );
        Ok(Self {
            phase,
            pattern: Regex::new(&pattern)?,
        })
    }

    /// One matcher per sub-phase, in vocabulary order.
    pub fn all() -> Result<Vec<Self>> {
        CompactionPhase::ALL.into_iter().map(Self::new).collect()
    }

    pub fn phase(&self) -> CompactionPhase {
        self.phase
    }
}

impl LineMatcher for CompactionPhaseMatcher {
    fn name(&self) -> &'static str {
        self.phase.log_name()
    }

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        let Some(caps) = self.pattern.captures(line) else {
            return Ok(false);
        };
        let duration = cx.capture_number(&caps, "secs")?;
        // untimed sub-phase lines belong to the collection that printed last
        let start = match (caps.name("ts"), cx.state.last_timestamp()) {
            (None, Some(inherited)) => inherited,
            _ => cx.capture_timestamp(&caps)?,
        };
        let end = start + duration;

        cx.record(
            MetricTag::Compaction(self.phase),
            duration,
            Stamp::Interval { begin: start, end },
        )?;
        cx.observe_end(end);
        cx.activity(&self.phase.activity_name(), start, duration, None)?;
        Ok(true)
    }
}
