//! Unified error type.

use crate::method::Method;

/// The error type returned by menhir's fallible operations.
///
/// Client mistakes (unknown action, wrong verb, invalid fields, wrong
/// content type) are expressed as HTTP [`Response`](crate::Response) values,
/// not as `Error`s. This type surfaces wiring mistakes: a schema that cannot
/// be built, a verb with no extractor, two validators disagreeing about the
/// same request. The hosting server should treat it as fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request reached a validator through a verb that has no extractor.
    #[error("no extractor registered for {0}")]
    UnsupportedExtractor(String),

    /// An allow-list named a verb menhir does not know.
    #[error("unsupported method `{0}`")]
    UnsupportedMethod(String),

    /// A validator was configured to read from a source with no extractor.
    #[error("`{0}` is not a validatable source")]
    UnsupportedSource(Method),

    /// Two fields of one schema share a name.
    #[error("duplicate field `{0}` in schema")]
    DuplicateField(String),

    /// A JSON Schema document failed to compile.
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),

    /// A later validator produced a value that disagrees with the one
    /// already stored in the request's [`Overhead`](crate::Overhead).
    #[error("validated value for `{0}` conflicts with an earlier validator")]
    ContextConflict(String),
}
