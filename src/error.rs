//! Error taxonomy for query-vector construction.
//!
//! Functions in this crate return `anyhow::Result`. Errors raised by the HyDE
//! core itself are `HydeError` values (either the error or a context layer on
//! top of the collaborator's cause), so callers can match on them with
//! `err.downcast_ref::<HydeError>()`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydeError {
    #[error("unknown task style: {name}")]
    UnknownTaskStyle { name: String },

    #[error("document generation failed after {attempts} attempt(s)")]
    GenerationFailure { attempts: u32 },

    #[error("generator returned {received} completion(s), {requested} requested")]
    ShortGeneration { requested: usize, received: usize },

    #[error("cannot build a HyDE vector from an empty hypothesis pool")]
    EmptyHypothesisPool,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Returns the `HydeError` carried anywhere in an error chain.
///
/// anyhow resolves context layers during downcasting, so this finds the value
/// whether it was the root error or attached with `.context(..)`.
pub fn find_hyde_error(err: &anyhow::Error) -> Option<&HydeError> {
    err.downcast_ref::<HydeError>()
}
