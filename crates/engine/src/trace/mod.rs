//! Activity timeline
//!
//! - `activity.rs`: immutable activities and their kinds
//! - `set.rs`: ordered per-kind sequences with duration summaries
//! - `timeline.rs`: the lock-serialized [`Trace`] and its listeners
//! - `checkpoint.rs`: delta tracking over a trace

pub mod activity;
pub mod checkpoint;
pub mod set;
pub mod timeline;

pub use activity::{Activity, ActivityKind, STW_OVERHEAD_PERCENT};
pub use checkpoint::Checkpoint;
pub use set::{ActivitySet, OVERLAP_TOLERANCE_SECS};
pub use timeline::{ListenerId, Trace, TraceListener, ALL_ACTIVITIES};
