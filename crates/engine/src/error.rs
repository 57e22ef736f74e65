use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A numeric field inside an otherwise matched line could not be parsed.
    #[error("Malformed input at {source_id}:{line}: field `{field}` has unparsable value `{value}`")]
    MalformedInput {
        source_id: String,
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Broken internal contract (kind ids out of order, unregistered kind).
    /// Callers must not continue ingesting into the affected trace.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad line grammar: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for errors that end the current source but leave the run usable.
    pub fn is_source_local(&self) -> bool {
        match self {
            EngineError::MalformedInput { .. } | EngineError::Io(_) => true,
            EngineError::Context { source, .. } => source.is_source_local(),
            _ => false,
        }
    }

    /// Line number attached to the error, if any.
    pub fn line(&self) -> Option<u64> {
        match self {
            EngineError::MalformedInput { line, .. } => Some(*line),
            EngineError::Context { source, .. } => source.line(),
            _ => None,
        }
    }
}
