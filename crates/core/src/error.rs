//! Core error types (pure - no I/O variants).

use thiserror::Error;

/// Errors produced by marshaling, descriptor validation and request building.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid numeric literal: {0:?}")]
    InvalidNumericLiteral(String),

    #[error("Item for table '{table}' is missing key attribute '{attribute}'")]
    MissingKeyAttribute { table: String, attribute: String },

    #[error("Key attribute '{attribute}' must be of type {expected}, found {found}")]
    KeyTypeMismatch {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid table descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Table '{0}' is already registered")]
    DuplicateTable(String),

    #[error("Table '{0}' is not registered")]
    UnknownTable(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_numeric_literal_display() {
        let error = CoreError::InvalidNumericLiteral("12abc".to_string());
        assert_eq!(error.to_string(), "Invalid numeric literal: \"12abc\"");
    }

    #[test]
    fn test_missing_key_attribute_display() {
        let error = CoreError::MissingKeyAttribute {
            table: "user_logs".to_string(),
            attribute: "SK".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Item for table 'user_logs' is missing key attribute 'SK'"
        );
    }

    #[test]
    fn test_key_type_mismatch_display() {
        let error = CoreError::KeyTypeMismatch {
            attribute: "PK".to_string(),
            expected: "S",
            found: "N",
        };
        assert_eq!(
            error.to_string(),
            "Key attribute 'PK' must be of type S, found N"
        );
    }

    #[test]
    fn test_duplicate_table_display() {
        let error = CoreError::DuplicateTable("orders".to_string());
        assert_eq!(error.to_string(), "Table 'orders' is already registered");
    }
}
