//! Line sources for stockq.
//!
//! A `LineSource` describes where raw lines come from (a file, an HTTP
//! endpoint or an in-memory buffer). Opening it yields a `LineReader`, a
//! lazy, finite sequence of lines that stops early when its
//! `CancellationToken` is cancelled.

pub mod error;
pub mod reader;
pub mod source;

pub use error::{SourceError, SourceResult};
pub use reader::LineReader;
pub use source::{LineSource, IDENTIFIER_PLACEHOLDER};
