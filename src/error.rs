//! Error types for schema loading and query analysis

use thiserror::Error;

/// Errors raised while analyzing a single SQL statement.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("unknown table or view: {0}")]
    UnknownTable(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("cannot determine a name for result column: {0}")]
    MissingAlias(String),

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("failed to parse SQL: {0}")]
    Parse(String),

    #[error("schema error: {0}")]
    Schema(#[from] tokio_postgres::Error),
}
