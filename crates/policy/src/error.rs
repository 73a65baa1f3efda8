//! Policy error types.

use crate::{Phase, ProviderError};
use thiserror::Error;

/// Policy errors.
///
/// A denial is not an error: see [`Decision`](crate::Decision) and
/// [`Verdict`](crate::Verdict). This enum is marked `#[non_exhaustive]` to
/// allow adding new variants in future versions without breaking
/// downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The schema is invalid, or a table or relationship is unknown.
    #[error(transparent)]
    Schema(#[from] schema::Error),

    /// A predicate reads a field that is not a column of its table.
    #[error("predicate on `{table}` references unknown column `{column}`")]
    UnknownColumn { table: String, column: String },

    /// An `and`/`or` node has no children.
    #[error("empty `and`/`or` in `{table}` {phase} rules")]
    EmptyCombinator { table: String, phase: Phase },

    /// A named predicate was referenced but never defined.
    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    /// Named predicates reference each other in a cycle.
    #[error("predicate `{0}` references itself")]
    PredicateCycle(String),

    /// The mutation request is malformed.
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    /// The traversal provider failed. Never treated as an allow.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Failed to parse a policy file.
    #[error("failed to parse policy: {0}")]
    Parse(String),

    /// An I/O error occurred while reading policy.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
