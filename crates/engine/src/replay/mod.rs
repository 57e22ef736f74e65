//! Trace replay
//!
//! - `throttle.rs`: real-time and batched pacing
//! - `scheduler.rs`: the play/pause/stop state machine driving a replay thread

pub mod scheduler;
pub mod throttle;

pub use scheduler::{ReplayScheduler, ReplayState};
pub use throttle::{ReplayMode, Throttle};
