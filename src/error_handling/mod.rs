//! Error handling.
//!
//! This module provides the error taxonomy of the crate:
//! - **Construction errors**: a record shape could not be resolved into columns
//!   and accessors, or the saver configuration is invalid
//! - **Sink errors**: the database handle is unsupported or a statement failed
//! - **Flush errors**: a batch could not be written; surfaced only to the caller
//!   whose action triggered that flush
//! - **Initialization errors**: logger setup

mod types;

// Re-export public API
pub use types::{DatabaseError, InitializationError, SaverError, SchemaError};
