//! Pipeline error types.

use docframe_engine::DocumentKey;
use thiserror::Error;

/// Errors surfaced to callers of the synchronous query APIs.
///
/// The asynchronous mutation path never returns these; a mutation against
/// a destroyed document degrades to a no-op instead. Queries that must
/// hand a value back to the caller report why they cannot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The document was destroyed.
    #[error("document {0} is destroyed")]
    Destroyed(DocumentKey),

    /// The document has no native counterpart yet (no body was created).
    #[error("document {0} has no native document")]
    NoNativeDocument(DocumentKey),

    /// No surface is attached to the document.
    #[error("document {0} has no attached surface")]
    NoSurface(DocumentKey),
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RenderError::Destroyed(DocumentKey(3)).to_string(),
            "document 3 is destroyed"
        );
        assert_eq!(
            RenderError::NoNativeDocument(DocumentKey(4)).to_string(),
            "document 4 has no native document"
        );
    }
}
