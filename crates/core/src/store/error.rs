use thiserror::Error;

/// Errors reported by a store backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Condition check failed on table {table}")]
    ConditionFailed { table: String },
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Request throttled: {0}")]
    Throttled(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// True for failures a caller may retry as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Throttled(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
