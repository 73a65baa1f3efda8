use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Schema(#[from] schema::Error),

    #[error("unsupported value in `{table}.{column}`: {reason}")]
    UnsupportedValue {
        table: String,
        column: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
