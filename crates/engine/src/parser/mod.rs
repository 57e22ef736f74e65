//! GC log parsing
//!
//! - `traits.rs`: the [`LineMatcher`] seam every grammar implements
//! - `grammar.rs`: regex fragments shared by the grammars
//! - `context.rs`: per-line extraction context and collector state
//! - `formats/`: one matcher per GC log grammar
//! - `dispatcher.rs`: frequency-ranked matcher dispatch
//!
//! A line is offered to matchers in priority order; the first that
//! recognizes it records its samples and activities and the rest are
//! skipped. Unrecognized lines are normal in GC logs and are ignored.

pub mod context;
pub mod dispatcher;
pub mod formats;
pub(crate) mod grammar;
pub mod traits;

pub use context::{Extraction, GcState, Occupancy};
pub use dispatcher::{Dispatcher, DispatcherStats, MatcherHits};
pub use traits::LineMatcher;
