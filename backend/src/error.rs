//! Error types for the storefront backend.
//!
//! This module defines the error hierarchy used across the crate:
//!
//! - [`ImportError`] - CSV bulk import errors
//! - [`ExportError`] - CSV export errors
//! - [`StoreError`] - Persistence errors
//! - [`QueryError`] - List filtering errors
//! - [`ServerError`] - Top-level HTTP handler errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with this id.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A record violates a table constraint. `index` is the position of the
    /// offending record inside the batch.
    #[error("Constraint violated by {entity} #{index}: {message}")]
    Constraint {
        entity: &'static str,
        index: usize,
        message: String,
    },

    /// The store cannot be used (poisoned lock).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Fixture file could not be loaded.
    #[error("Fixture error: {0}")]
    Fixture(String),
}

// =============================================================================
// Import Errors
// =============================================================================

/// Errors during CSV bulk import.
///
/// Line numbers are 1-based and count the header as line 1.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unknown encoding label or bytes that are invalid in that encoding.
    #[error("Cannot decode upload as '{encoding}': {reason}")]
    Encoding { encoding: String, reason: String },

    /// Structurally invalid CSV (quoting, wrong number of fields).
    #[error("Line {line}: {message}")]
    Format { line: usize, message: String },

    /// Nothing to read a header from.
    #[error("CSV has no header row")]
    NoHeaders,

    /// A column the import target does not have.
    #[error("Line {line}: unknown column '{column}' for {entity}")]
    UnknownColumn {
        line: usize,
        column: String,
        entity: &'static str,
    },

    /// A value that does not parse as its field type.
    #[error("Line {line}, column '{column}' (value '{value}'): {message}")]
    MalformedValue {
        line: usize,
        column: String,
        value: String,
        message: String,
    },

    /// A foreign key that points at nothing.
    #[error("Line {line}, column '{column}': {entity} with id {id} does not exist")]
    ReferenceResolution {
        line: usize,
        column: String,
        entity: &'static str,
        id: i64,
    },

    /// A foreign-key lookup could not be performed.
    #[error("Reference lookup failed: {0}")]
    Lookup(#[source] StoreError),

    /// The store rejected the batch; nothing was persisted.
    #[error("Batch insert rejected: {0}")]
    BatchPersist(#[source] StoreError),

    /// Failed to read the upload stream.
    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub fn malformed(
        line: usize,
        column: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedValue {
            line,
            column: column.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors during CSV export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A requested field is not an attribute of the exported record type.
    #[error("Unknown export field '{field}' for {entity}")]
    UnknownField { entity: &'static str, field: String },

    /// The download filename cannot be placed in a header.
    #[error("Invalid download filename: {0}")]
    InvalidFilename(String),

    /// CSV writer error.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error while flushing output.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors while applying list filters.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Filter value does not parse for the filtered field.
    #[error("Invalid value '{value}' for filter '{field}'")]
    InvalidFilter { field: String, value: String },
}

// =============================================================================
// Server Errors (top-level)
// =============================================================================

/// HTTP handler errors.
///
/// Converted into JSON responses by the `IntoResponse` impl in
/// [`crate::api::types`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// Import error.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Export error.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Query error.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A snapshot could not be turned into JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // StoreError -> ServerError
        let store_err = StoreError::NotFound {
            entity: "Product",
            id: 4,
        };
        let server_err: ServerError = store_err.into();
        assert_eq!(server_err.to_string(), "Product with id 4 not found");

        // ImportError -> ServerError keeps the row context
        let import_err = ImportError::malformed(3, "price", "abc", "not a decimal");
        let server_err: ServerError = import_err.into();
        assert!(server_err.to_string().contains("Line 3"));
        assert!(server_err.to_string().contains("price"));
    }

    #[test]
    fn test_reference_error_format() {
        let err = ImportError::ReferenceResolution {
            line: 2,
            column: "user".into(),
            entity: "User",
            id: 99,
        };
        let msg = err.to_string();
        assert!(msg.contains("Line 2"));
        assert!(msg.contains("User with id 99 does not exist"));
    }

    #[test]
    fn test_batch_persist_keeps_source() {
        use std::error::Error as _;

        let err = ImportError::BatchPersist(StoreError::Constraint {
            entity: "Order",
            index: 1,
            message: "promocode longer than 20 characters".into(),
        });
        assert!(err.source().is_some());
        assert!(err.to_string().contains("promocode"));
    }
}
