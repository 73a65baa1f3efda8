//! Schema error types.

use thiserror::Error;

/// Schema errors.
///
/// Everything except [`Error::InvalidRow`] is raised while the registry is
/// being built and is fatal at startup. This enum is marked
/// `#[non_exhaustive]` to allow adding new variants in future versions
/// without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// A table with the same name was already defined.
    #[error("table `{0}` is defined more than once")]
    DuplicateTable(String),

    /// A column name appears twice in one table.
    #[error("table `{table}` defines column `{column}` more than once")]
    DuplicateColumn { table: String, column: String },

    /// A relationship name appears twice on one table.
    #[error("table `{table}` defines relationship `{name}` more than once")]
    DuplicateRelationship { table: String, name: String },

    /// The primary key lists no columns.
    #[error("table `{0}` has an empty primary key")]
    EmptyPrimaryKey(String),

    /// A primary key column is not a column of the table.
    #[error("primary key of `{table}` references missing column `{column}`")]
    MissingKeyColumn { table: String, column: String },

    /// A primary key column is declared optional.
    #[error("primary key column `{table}.{column}` must not be optional")]
    NullableKeyColumn { table: String, column: String },

    /// A relationship was declared without hops.
    #[error("relationship `{table}.{name}` has no hops")]
    EmptyRelationship { table: String, name: String },

    /// A hop references a field or table that does not exist, or joins
    /// columns of different types.
    #[error("relationship `{table}.{name}` hop {hop}: {reason}")]
    InvalidHop {
        table: String,
        name: String,
        hop: usize,
        reason: String,
    },

    /// A table was referenced by name but never defined.
    #[error("unknown table `{0}`")]
    UnknownTable(String),

    /// A relationship was referenced by name but never defined.
    #[error("unknown relationship `{name}` on table `{table}`")]
    UnknownRelationship { table: String, name: String },

    /// A row does not conform to its table's columns.
    #[error("invalid `{table}` row: {reason}")]
    InvalidRow { table: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
