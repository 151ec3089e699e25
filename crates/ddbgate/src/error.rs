//! Error types for the store collaborator and the gateway components.

use ddbgate_core::{CoreError, Item, TableReadinessState};
use thiserror::Error;

/// Errors reported by an [`AttributeStore`](crate::store::AttributeStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Conditional check failed")]
    ConditionFailed,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Throttling and transport failures may succeed when repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Throttled(_) | StoreError::Transport(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by the lifecycle, write and read components.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Table '{table}' not ready after {attempts} attempts (last state: {})", state_label(.last_state))]
    TableNotReady {
        table: String,
        attempts: u32,
        last_state: Option<TableReadinessState>,
    },

    #[error("Table '{table}' already exists")]
    AlreadyExists { table: String },

    #[error("Item already exists in '{table}': {key}")]
    DuplicateKey { table: String, key: String },

    #[error("{} item(s) unprocessed in '{table}' after retries ({committed} committed)", .unprocessed.len())]
    PartialBatchFailure {
        table: String,
        unprocessed: Vec<Item>,
        committed: usize,
    },

    #[error("Not found in '{table}'{}", key_suffix(.key))]
    NotFound { table: String, key: Option<String> },

    #[error("Invalid numeric literal: {0:?}")]
    InvalidNumericLiteral(String),

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: &'static str },

    #[error(transparent)]
    Validation(CoreError),

    #[error("{operation} failed on '{table}'{}: {source}", key_suffix(.key))]
    Store {
        operation: &'static str,
        table: String,
        key: Option<String>,
        #[source]
        source: StoreError,
    },
}

fn state_label(state: &Option<TableReadinessState>) -> &'static str {
    state.map_or("absent", |s| s.as_str())
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_deref().map(|k| format!(" ({k})")).unwrap_or_default()
}

impl GatewayError {
    /// Wraps a collaborator error with the operation and table it came from.
    pub fn store(operation: &'static str, table: impl Into<String>, source: StoreError) -> Self {
        GatewayError::Store {
            operation,
            table: table.into(),
            key: None,
            source,
        }
    }

    /// Like [`store`](Self::store), also naming the affected key.
    pub fn store_with_key(
        operation: &'static str,
        table: impl Into<String>,
        key: impl Into<String>,
        source: StoreError,
    ) -> Self {
        GatewayError::Store {
            operation,
            table: table.into(),
            key: Some(key.into()),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidNumericLiteral(text) => GatewayError::InvalidNumericLiteral(text),
            other => GatewayError::Validation(other),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
