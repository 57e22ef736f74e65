use regex::Regex;

use crate::error::Result;
use crate::metrics::{CmsPhase, DerivedKind, MetricTag, PhaseClock, Stamp};
use crate::parser::grammar::{timestamp_prefix, NUM};
use crate::parser::traits::{Extraction, LineMatcher};

const PHASES: &str = "abortable-preclean|preclean|mark|sweep|reset";

/// CMS concurrent phases and their start markers.
///
/// ```text
/// 5.0: [CMS-concurrent-mark-start]
/// 6.35: [CMS-concurrent-mark: 1.200/1.350 secs]
/// ```
///
/// The phase interval starts at the marker's timestamp. A `reset` closes
/// the timing window: mutator allocation rates are computed over it and a
/// new window starts.
pub struct CmsConcurrentMatcher {
    start: Regex,
    end: Regex,
}

impl CmsConcurrentMatcher {
    pub fn new() -> Result<Self> {
        let start = format!(
            r"{ts}\[CMS-concurrent-(?P<phase>{phases})-start\]",
            ts = timestamp_prefix(),
            phases = PHASES,
        );
        let end = format!(
            r"{ts}\[CMS-concurrent-(?P<phase>{phases}):\s*(?P<active>{num})/(?P<elapsed>{num})\s*secs\]",
            ts = timestamp_prefix(),
            phases = PHASES,
            num = NUM,
        );
        Ok(Self {
            start: Regex::new(&start)?,
            end: Regex::new(&end)?,
        })
    }
}

impl LineMatcher for CmsConcurrentMatcher {
    fn name(&self) -> &'static str {
        "cms-concurrent"
    }

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        if let Some(caps) = self.start.captures(line) {
            let Some(phase) = CmsPhase::from_log_name(&caps["phase"]) else {
                return Ok(false);
            };
            let ts = cx.capture_timestamp(&caps)?;
            cx.state.start_phase(phase, ts);
            return Ok(true);
        }

        let Some(caps) = self.end.captures(line) else {
            return Ok(false);
        };
        let Some(phase) = CmsPhase::from_log_name(&caps["phase"]) else {
            return Ok(false);
        };
        let active = cx.capture_number(&caps, "active")?;
        let elapsed = cx.capture_number(&caps, "elapsed")?;
        let ts = cx.capture_timestamp(&caps)?;
        let begin = cx.state.take_phase_start(phase).unwrap_or_else(|| {
            tracing::trace!(source = %cx.source_id, line = cx.line_no, phase = phase.log_name(), "parser: concurrent phase without start marker");
            ts
        });
        let end = begin + elapsed;
        let stamp = Stamp::Interval { begin, end };

        cx.record(MetricTag::Concurrent(phase, PhaseClock::Active), active, stamp)?;
        cx.record(MetricTag::Concurrent(phase, PhaseClock::Elapsed), elapsed, stamp)?;
        cx.window.add_concurrent(elapsed, cx.config.concurrent_threads);
        cx.observe_end(end);

        let overhead = if elapsed > 0.0 {
            (active / elapsed * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        cx.activity(phase.activity_name(), begin, elapsed, Some(overhead))?;

        if phase == CmsPhase::Reset {
            let cumulative = cx.metrics.cumulative_allocation();
            if !cx.metrics.has_generated_timestamps() {
                let rates = cx.window.rates(cumulative);
                if let Some(rate) = rates.per_elapsed_cpu {
                    cx.record(
                        MetricTag::Derived(DerivedKind::MutatorAllocRateElapsedCpu),
                        rate,
                        Stamp::Point(end),
                    )?;
                }
                if let Some(rate) = rates.per_mutator_cpu {
                    cx.record(
                        MetricTag::Derived(DerivedKind::MutatorAllocRateMutatorCpu),
                        rate,
                        Stamp::Point(end),
                    )?;
                }
            }
            cx.window.reset(end, cumulative);
        }
        Ok(true)
    }
}
