//! Metric accumulation
//!
//! - `tag.rs`: the fixed set of statistics channels and their timestamp arity
//! - `accumulator.rs`: online count/sum/min/max/stddev/geomean and run comparison
//! - `store.rs`: per-channel store with optional raw sample retention
//! - `set.rs`: all channels of one run plus multi-source timestamp offsets
//! - `export.rs`: channel dump hook and JSON report

pub mod accumulator;
pub mod export;
pub mod set;
pub mod store;
pub mod tag;

pub use accumulator::{percent_change, Accumulator, Comparison, Summary};
pub use set::{ChannelComparison, ChannelReport, MetricSet, MetricsReport, UNKNOWN_TIMESTAMP};
pub use store::{DataStore, Stamp};
pub use tag::{
    CmsPhase, CompactionPhase, DerivedKind, HeapKind, MetricTag, PauseKind, PhaseClock,
    TimestampArity,
};
