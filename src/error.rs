//! Error types for enrich.

use thiserror::Error;

/// Result type for enrich operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for enrich operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Structural shape violation: the document does not match the expected schema.
    #[error("schema violation: {message}")]
    Schema {
        /// Human-readable description of the violation.
        message: String,
        /// Structured diagnostic payload (counts, offending ids).
        details: serde_json::Value,
    },

    /// Referential/ordering/semantic violation detected by the runtime
    /// invariant validator, or raised proactively by a stage precondition.
    #[error("invariant violation: {message}")]
    Invariant {
        /// Human-readable description of the violation.
        message: String,
        /// Structured diagnostic payload (counts, offending ids).
        details: serde_json::Value,
    },

    /// A validation hook failed around a stage boundary. Tags the phase at
    /// which the underlying error occurred, e.g. `before:chunking:schema`.
    #[error("{phase}: {source}")]
    Hook {
        /// Phase tag: `entry:*`, `before:<stage>:*`, `after:<stage>:*`, `final:*`.
        phase: String,
        /// The underlying schema or invariant error.
        #[source]
        source: Box<Error>,
    },

    /// An unknown pipeline target was requested.
    #[error("unknown target {target:?} (known targets: {})", known.join(", "))]
    UnknownTarget {
        /// The requested target name.
        target: String,
        /// The targets the registry actually knows.
        known: Vec<String>,
    },

    /// Invalid input provided by a caller (bad flags, unreadable files).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Lexicon service failure. Only surfaced by explicit client calls;
    /// stages absorb these and proceed without evidence.
    #[error("lexicon error: {0}")]
    Lexicon(String),

    /// External runtime (subprocess) failure.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a schema violation with a structured detail payload.
    pub fn schema(message: impl Into<String>, details: serde_json::Value) -> Self {
        Error::Schema {
            message: message.into(),
            details,
        }
    }

    /// Create an invariant violation with a structured detail payload.
    pub fn invariant(message: impl Into<String>, details: serde_json::Value) -> Self {
        Error::Invariant {
            message: message.into(),
            details,
        }
    }

    /// Wrap a validation failure with the phase tag at which it occurred.
    pub fn hook(phase: impl Into<String>, source: Error) -> Self {
        Error::Hook {
            phase: phase.into(),
            source: Box::new(source),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a lexicon error.
    pub fn lexicon(msg: impl Into<String>) -> Self {
        Error::Lexicon(msg.into())
    }

    /// Create a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime(msg.into())
    }

    /// The phase tag if this is a hook error.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        match self {
            Error::Hook { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// True for the two fatal validation families (schema or invariant),
    /// looking through hook wrapping.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Schema { .. } | Error::Invariant { .. } => true,
            Error::Hook { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}
