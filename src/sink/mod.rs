//! Relational sinks.
//!
//! A sink is the database a saver writes to. The saver only needs three
//! things from it:
//! - execute one parameterized statement
//! - name the SQL dialect, which decides the upsert clause and the bind limit
//! - introspect a record shape with its own naming rules
//!
//! `MySqlSink` and `SqliteSink` wrap sqlx pools; `connect` picks one from a
//! database URL.

mod introspect;
mod mysql;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use strum_macros::{Display, EnumString};

use crate::config::{MYSQL_MAX_BIND_PARAMS, SQLITE_MAX_BIND_PARAMS};
use crate::error_handling::{DatabaseError, SaverError, SchemaError};
use crate::schema::{NamingStrategy, ShapeDescriptor, SqlValue};

pub use introspect::{parse_metadata, ColumnMetadata, SchemaMetadata};
pub use mysql::MySqlSink;
pub use sqlite::SqliteSink;

/// SQL dialect spoken by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Dialect {
    /// `ON DUPLICATE KEY UPDATE`
    MySql,
    /// `ON CONFLICT (...) DO UPDATE`
    Sqlite,
}

impl Dialect {
    /// Largest number of bind parameters one statement may carry.
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::MySql => MYSQL_MAX_BIND_PARAMS,
            Dialect::Sqlite => SQLITE_MAX_BIND_PARAMS,
        }
    }
}

/// A database the saver can write batches to.
///
/// The sink is shared: other code may write to the same tables concurrently,
/// and the saver assumes nothing beyond the database's own locking.
#[async_trait]
pub trait RelationalSink: Send + Sync {
    /// Executes one statement with positional `?` parameters and returns the
    /// number of affected rows.
    async fn execute(&self, sql: &str, args: Vec<SqlValue>) -> Result<u64, DatabaseError>;

    /// SQL dialect the statements are built for.
    fn dialect(&self) -> Dialect;

    /// Naming rules used by `introspect`.
    fn naming(&self) -> NamingStrategy {
        NamingStrategy::default()
    }

    /// Maps a record shape to its table and columns.
    ///
    /// # Errors
    ///
    /// Returns a `SchemaError` when the mapper does not recognise the shape.
    fn introspect(&self, shape: &ShapeDescriptor) -> Result<SchemaMetadata, SchemaError> {
        parse_metadata(shape, &self.naming())
    }
}

/// Opens a sink for a database URL.
///
/// `mysql://` URLs open a `MySqlSink`; `sqlite:` URLs open a `SqliteSink`
/// (a file path is created if missing).
///
/// # Errors
///
/// Returns `SaverError::UnsupportedSink` for any other scheme and
/// `SaverError::Connect` if the pool cannot be opened.
pub async fn connect(url: &str) -> Result<Arc<dyn RelationalSink>, SaverError> {
    let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
    match scheme.as_str() {
        "mysql" | "mariadb" => {
            let sink = MySqlSink::connect(url).await.map_err(SaverError::Connect)?;
            Ok(Arc::new(sink))
        }
        "sqlite" => {
            let sink = SqliteSink::connect(url).await.map_err(SaverError::Connect)?;
            Ok(Arc::new(sink))
        }
        _ => Err(SaverError::UnsupportedSink(format!(
            "unsupported database URL scheme '{}' (expected mysql:// or sqlite:)",
            scheme
        ))),
    }
}
