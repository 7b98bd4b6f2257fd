//! Error types for Huckleberry operations.

use thiserror::Error;

/// Result type for Huckleberry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Huckleberry operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Schema description is invalid; the compilation is abandoned.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Buffer exhausted before a complete value was decoded.
    #[error("short buffer: needed {needed} bytes, only {available} available")]
    ShortBuffer { needed: usize, available: usize },

    /// Encoding is structurally invalid beyond simple truncation.
    #[error("malformed encoding: {0}")]
    Malformed(String),

    /// Varint continues past its maximum width.
    #[error("varint overflow")]
    VarintOverflow,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Datum does not have the shape the codec requires.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A child codec failed; `context` localizes the failure.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Creates a short buffer error.
    pub fn short_buffer(needed: usize, available: usize) -> Self {
        Self::ShortBuffer { needed, available }
    }

    /// Creates a malformed encoding error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    /// Wraps this error with localizing context (field name, item index, ...).
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Unwraps `Context` layers down to the originating error.
    pub fn root_cause(&self) -> &Error {
        let mut err = self;
        while let Error::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// Returns true if the root cause is a compile-time schema error.
    pub fn is_schema(&self) -> bool {
        matches!(self.root_cause(), Error::Schema(_))
    }

    /// Returns true if the root cause is decode-side buffer exhaustion.
    pub fn is_short_buffer(&self) -> bool {
        matches!(self.root_cause(), Error::ShortBuffer { .. })
    }

    /// Returns true if the root cause is a structurally invalid encoding.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::Malformed(_) | Error::VarintOverflow | Error::InvalidUtf8
        )
    }

    /// Returns true if the root cause is an encode-side datum mismatch.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.root_cause(), Error::TypeMismatch(_))
    }
}
