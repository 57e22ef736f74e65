//! Model: EngineConfig and ReplayConfig.

use serde::{Deserialize, Serialize};

/// Smallest gap allowed between concatenated sources, in seconds.
pub const MIN_SOURCE_GAP_FLOOR_SECS: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// CPU cores available to the monitored JVM; scales the *_cpu_time figures.
    pub cpu_count: u32,
    /// Threads a concurrent collector phase is assumed to keep busy.
    pub concurrent_threads: u32,
    /// Timestamps of a concatenated source start at a multiple of this gap.
    pub source_gap_secs: f64,
    /// Minimum distance between the end of one source and the start of the next.
    pub min_source_gap_secs: f64,
    /// Keep raw samples (and timestamps) next to the running statistics.
    pub retain_samples: bool,
    /// Register the parallel-old compaction sub-phase matchers.
    pub compaction_phases: bool,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Playback speed for the real-time throttle, in percent (100 = original pace).
    pub speed_percent: u32,
    /// Upper bound on pause/stop latency while a throttle is waiting.
    pub poll_interval_ms: u64,
    /// Activities emitted per batch by the fast throttle.
    pub fast_batch_size: usize,
    /// Sleep between two batches of the fast throttle.
    pub fast_batch_sleep_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cpu_count: 1,
            concurrent_threads: 1,
            source_gap_secs: 600.0,
            min_source_gap_secs: MIN_SOURCE_GAP_FLOOR_SECS,
            retain_samples: true,
            compaction_phases: true,
            replay: ReplayConfig::default(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed_percent: 100,
            poll_interval_ms: 10,
            fast_batch_size: 64,
            fast_batch_sleep_ms: 50,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.cpu_count == 0 {
            return Err("cpu_count must be > 0".to_string());
        }
        if self.concurrent_threads == 0 {
            return Err("concurrent_threads must be > 0".to_string());
        }
        if !(self.min_source_gap_secs >= MIN_SOURCE_GAP_FLOOR_SECS) {
            return Err(format!(
                "min_source_gap_secs must be >= {} (got {})",
                MIN_SOURCE_GAP_FLOOR_SECS, self.min_source_gap_secs
            ));
        }
        if !self.source_gap_secs.is_finite() || self.source_gap_secs <= 0.0 {
            return Err("source_gap_secs must be a positive number".to_string());
        }
        self.replay.validate()
    }

    /// The source gap actually applied: never below the minimum gap.
    pub fn effective_source_gap(&self) -> f64 {
        self.source_gap_secs.max(self.min_source_gap_secs)
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.speed_percent == 0 {
            return Err("replay.speed_percent must be > 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("replay.poll_interval_ms must be > 0".to_string());
        }
        if self.fast_batch_size == 0 {
            return Err("replay.fast_batch_size must be > 0".to_string());
        }
        Ok(())
    }
}
