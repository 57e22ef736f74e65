pub use super::context::Extraction;
use crate::error::Result;

/// One GC log grammar.
///
/// `try_match` returns `Ok(false)` when the line is not in this grammar and
/// must leave `cx` untouched in that case. Grammars are disjoint: at most
/// one matcher accepts any given line.
pub trait LineMatcher: Send {
    fn name(&self) -> &'static str;

    fn try_match(&self, line: &str, cx: &mut Extraction<'_>) -> Result<bool>;
}
