//! Error types for engen.

use thiserror::Error;

/// Result type for engen operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for engen operations.
///
/// Every variant is fatal for the document being processed: there is no
/// partial recovery mid-document.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Entity type outside the configured type set.
    #[error("Invalid entity type {entity_type} (configured types: 0..{types_num})")]
    InvalidType {
        /// The offending type index.
        entity_type: usize,
        /// Number of configured types.
        types_num: usize,
    },

    /// Label or external entity index lookup miss.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A vector or matrix was supplied with the wrong dimensionality.
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being checked.
        what: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Malformed document or call arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid model configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error (TOML / JSON).
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure while processing one document, tagged with where it happened.
    #[error("Document '{document_id}' failed at step {step}: {source}")]
    Document {
        /// Identifier of the failing document.
        document_id: String,
        /// Token position at which processing failed.
        step: usize,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Candle ML error (when candle feature enabled).
    #[cfg(feature = "candle")]
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl Error {
    /// Create an invalid type error.
    #[must_use]
    pub fn invalid_type(entity_type: usize, types_num: usize) -> Self {
        Error::InvalidType {
            entity_type,
            types_num,
        }
    }

    /// Create an unknown entity error.
    #[must_use]
    pub fn unknown_entity(msg: impl Into<String>) -> Self {
        Error::UnknownEntity(msg.into())
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Wrap this error with the document id and step index it occurred at.
    ///
    /// Already-wrapped errors are returned unchanged so the innermost
    /// location is the one reported.
    #[must_use]
    pub fn in_document(self, document_id: impl Into<String>, step: usize) -> Self {
        match self {
            wrapped @ Error::Document { .. } => wrapped,
            other => Error::Document {
                document_id: document_id.into(),
                step,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, looking through document wrapping.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Document { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Check that a vector has the expected length.
pub(crate) fn ensure_dim(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::dimension_mismatch(what, expected, actual))
    }
}
