//! Error types for stockq-core.

use thiserror::Error;

/// Reasons a raw line could not be turned into a `PriceRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty line")]
    Empty,

    #[error("Expected at least {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Identifier field is empty")]
    EmptyIdentifier,

    #[error("Invalid price {value:?}: {reason}")]
    InvalidPrice { value: String, reason: String },
}

/// Result type alias for parser operations.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
