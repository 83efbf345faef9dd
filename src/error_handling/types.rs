//! Error type definitions.
//!
//! This module defines all error types used throughout the crate.

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// A value cannot be represented by the sink's bind types.
    #[error("Value out of range for {dialect}: {value}")]
    ValueOutOfRange {
        /// Dialect that rejected the value
        dialect: &'static str,
        /// Rendered value
        value: String,
    },

    /// The sink refused the statement without reaching the database.
    #[error("Statement rejected: {0}")]
    Rejected(String),
}

/// Error types for record shape resolution.
///
/// Raised by a sink's schema introspection when it does not recognise a
/// shape, and by the structural fallback walk when a shape yields no columns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The shape has no type name.
    #[error("Record shape has no type name")]
    UnnamedType,

    /// Two members at the same level share a declared name.
    #[error("Duplicate member '{member}' in {type_name}")]
    DuplicateMember {
        /// Owning type
        type_name: String,
        /// Repeated member name
        member: String,
    },

    /// A `column:` directive with an empty value.
    #[error("Empty column override on {type_name}.{member}")]
    EmptyColumnOverride {
        /// Owning type
        type_name: String,
        /// Member carrying the tag
        member: String,
    },

    /// A `column:` directive on an embedded member.
    #[error("Embedded member {type_name}.{member} cannot carry a column override")]
    EmbeddedColumnOverride {
        /// Owning type
        type_name: String,
        /// Embedded member
        member: String,
    },

    /// Resolution produced no persisted columns.
    #[error("Record type {0} has no persisted columns")]
    NoColumns(String),
}

/// Error types for batch saver operations.
#[derive(Error, Debug)]
pub enum SaverError {
    /// Column/accessor resolution failed on both the metadata and the
    /// structural path.
    #[error("Failed to resolve columns for {type_name}: {source}")]
    Construction {
        /// Record type being resolved
        type_name: String,
        /// Error from the structural fallback
        #[source]
        source: SchemaError,
    },

    /// The configuration does not fit the resolved schema.
    #[error("Invalid saver configuration: {0}")]
    InvalidConfig(String),

    /// The supplied database handle is not of a supported kind.
    #[error("Unsupported sink: {0}")]
    UnsupportedSink(String),

    /// The sink could not be opened.
    #[error("Sink connection error: {0}")]
    Connect(#[source] DatabaseError),

    /// The upsert for a batch failed.
    #[error("Failed to flush {rows} records into {table}: {source}")]
    Flush {
        /// Target table
        table: String,
        /// Rows of the batch that were not written
        rows: usize,
        /// Error returned by the sink
        #[source]
        source: DatabaseError,
    },

    /// The saver no longer accepts records.
    #[error("Batch saver for {0} is closed")]
    Closed(String),

    /// The background flush task panicked or was aborted.
    #[error("Background flush task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl SaverError {
    /// Returns true if the error came from writing a batch.
    pub fn is_flush_error(&self) -> bool {
        matches!(self, SaverError::Flush { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_flush_error_display_includes_table_and_rows() {
        let err = SaverError::Flush {
            table: "user_assets".to_string(),
            rows: 3,
            source: DatabaseError::Rejected("connection reset".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("user_assets"));
        assert!(msg.contains('3'));
        assert!(err.is_flush_error());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_construction_error_keeps_schema_source() {
        let err = SaverError::Construction {
            type_name: "Empty".to_string(),
            source: SchemaError::NoColumns("Empty".to_string()),
        };
        assert!(!err.is_flush_error());
        let source = err.source().expect("construction error has a source");
        assert_eq!(source.to_string(), "Record type Empty has no persisted columns");
    }

    #[test]
    fn test_database_error_from_sqlx() {
        let err: DatabaseError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, DatabaseError::SqlError(_)));
        assert!(err.to_string().starts_with("SQL error"));
    }

    #[test]
    fn test_schema_error_messages() {
        let dup = SchemaError::DuplicateMember {
            type_name: "User".to_string(),
            member: "Name".to_string(),
        };
        assert_eq!(dup.to_string(), "Duplicate member 'Name' in User");
        assert_eq!(
            SchemaError::UnnamedType.to_string(),
            "Record shape has no type name"
        );
    }
}
