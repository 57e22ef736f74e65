use serde::Serialize;

use super::formats::standard_matchers;
use super::traits::{Extraction, LineMatcher};
use crate::conf::EngineConfig;
use crate::error::Result;

/// Match counts after which matchers are re-ranked, before the periodic
/// schedule takes over.
pub const EARLY_REORDER_POINTS: [u64; 2] = [128, 512];

/// Re-rank matchers on every multiple of this many matches.
pub const REORDER_PERIOD: u64 = 1024;

struct Slot {
    matcher: Box<dyn LineMatcher>,
    hits: u64,
}

/// Hit count of one matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatcherHits {
    pub name: &'static str,
    pub hits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub lines: u64,
    pub matches: u64,
    pub reorders: u64,
    /// In current priority order.
    pub matchers: Vec<MatcherHits>,
}

/// Tries matchers in priority order per line and periodically moves the
/// most successful ones to the front.
pub struct Dispatcher {
    slots: Vec<Slot>,
    lines: u64,
    matches: u64,
    reorders: u64,
    adaptive: bool,
}

impl Dispatcher {
    pub fn new(matchers: Vec<Box<dyn LineMatcher>>) -> Self {
        Self {
            slots: matchers
                .into_iter()
                .map(|matcher| Slot { matcher, hits: 0 })
                .collect(),
            lines: 0,
            matches: 0,
            reorders: 0,
            adaptive: true,
        }
    }

    /// Keep the construction order for good. Each line is recognized by at
    /// most one grammar, so this changes speed, not results.
    pub fn fixed_order(mut self) -> Self {
        self.adaptive = false;
        self
    }

    /// Dispatcher over every known grammar.
    pub fn standard(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(standard_matchers(config)?))
    }

    /// Feed one line. `Ok(false)` means no grammar recognized it.
    pub fn process(&mut self, line: &str, cx: &mut Extraction<'_>) -> Result<bool> {
        self.lines += 1;
        let line = line.trim_end();

        let mut hit = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.matcher.try_match(line, cx)? {
                hit = Some(i);
                break;
            }
        }

        let Some(i) = hit else {
            tracing::trace!(source = %cx.source_id, line = cx.line_no, "parser: unrecognized line");
            return Ok(false);
        };
        self.slots[i].hits += 1;
        self.matches += 1;
        if self.adaptive && self.should_reorder() {
            self.reorder();
        }
        Ok(true)
    }

    fn should_reorder(&self) -> bool {
        EARLY_REORDER_POINTS.contains(&self.matches) || self.matches % REORDER_PERIOD == 0
    }

    fn reorder(&mut self) {
        // stable: ties keep their relative order
        self.slots.sort_by(|a, b| b.hits.cmp(&a.hits));
        self.reorders += 1;
        tracing::debug!(
            matches = self.matches,
            order = ?self.matcher_order(),
            "parser: matchers reordered"
        );
    }

    /// Matcher names in the order they are currently tried.
    pub fn matcher_order(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.matcher.name()).collect()
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn matches(&self) -> u64 {
        self.matches
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            lines: self.lines,
            matches: self.matches,
            reorders: self.reorders,
            matchers: self
                .slots
                .iter()
                .map(|s| MatcherHits {
                    name: s.matcher.name(),
                    hits: s.hits,
                })
                .collect(),
        }
    }
}
