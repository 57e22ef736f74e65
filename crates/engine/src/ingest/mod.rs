//! Source ingestion
//!
//! - `session.rs`: the [`Ingestor`] that feeds sources through the dispatcher
//! - `registry.rs`: concurrent per-source status shared across threads

pub mod registry;
pub mod session;

pub use registry::{SourceRecord, SourceRegistry, SourceStatus};
pub use session::{Ingestor, SourceSummary};
