use std::ops::Range;

use super::timeline::Trace;
use crate::error::{EngineError, Result};

/// Delta-since-last-look snapshot over a [`Trace`].
///
/// Consumers call [`Checkpoint::checkpoint`] and then walk
/// `delta(k)` / `all_delta()` to visit only activities appended since the
/// previous call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    previous: Vec<usize>,
    current: Vec<usize>,
    previous_all: usize,
    current_all: usize,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of kinds tracked.
    pub fn kind_count(&self) -> usize {
        self.current.len()
    }

    /// Start tracking kind `id`, which must be the next untracked one.
    pub fn extend(&mut self, id: usize) -> Result<()> {
        if id != self.current.len() {
            return Err(EngineError::InvariantViolation(format!(
                "checkpoint extended with kind {} while tracking {}",
                id,
                self.current.len()
            )));
        }
        self.previous.push(0);
        self.current.push(0);
        Ok(())
    }

    /// Shift current sizes to previous and re-read live sizes from `trace`.
    pub fn checkpoint(&mut self, trace: &Trace) {
        let (sizes, all) = trace.sizes();
        while self.current.len() < sizes.len() {
            self.previous.push(0);
            self.current.push(0);
        }
        for (k, size) in sizes.into_iter().enumerate() {
            self.previous[k] = self.current[k];
            self.current[k] = size;
        }
        self.previous_all = self.current_all;
        self.current_all = all;
    }

    /// True iff the trace changed since the last [`Checkpoint::checkpoint`].
    pub fn needs_checkpoint(&self, trace: &Trace) -> bool {
        let (sizes, all) = trace.sizes();
        all != self.current_all || sizes.len() != self.current.len() || sizes != self.current
    }

    pub fn previous_size(&self, id: usize) -> usize {
        self.previous.get(id).copied().unwrap_or(0)
    }

    pub fn current_size(&self, id: usize) -> usize {
        self.current.get(id).copied().unwrap_or(0)
    }

    pub fn previous_all_size(&self) -> usize {
        self.previous_all
    }

    pub fn current_all_size(&self) -> usize {
        self.current_all
    }

    /// Indices of kind `id` appended between the last two checkpoints.
    pub fn delta(&self, id: usize) -> Range<usize> {
        self.previous_size(id)..self.current_size(id)
    }

    pub fn all_delta(&self) -> Range<usize> {
        self.previous_all..self.current_all
    }
}
