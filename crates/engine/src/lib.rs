//! JVM garbage-collector log analysis engine.
//!
//! - `parser`: per-format line matchers and the frequency-ranked dispatcher
//! - `metrics`: per-channel statistics and multi-source timestamp offsets
//! - `timing`: pause/concurrent/mutator time between concurrent resets
//! - `trace`: the activity timeline, its listeners and checkpoints
//! - `replay`: paced re-emission of a trace into another
//! - `ingest`: drives sources through all of the above
//! - `conf`: engine configuration

pub mod conf;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod parser;
pub mod replay;
pub mod timing;
pub mod trace;

pub use conf::{EngineConfig, ReplayConfig};
pub use error::{EngineError, Result};
pub use ingest::{Ingestor, SourceRegistry, SourceStatus, SourceSummary};
pub use metrics::MetricSet;
pub use replay::{ReplayMode, ReplayScheduler, ReplayState, Throttle};
pub use trace::{Activity, ActivityKind, Checkpoint, Trace, TraceListener};
