//! SQLite sink backed by a sqlx connection pool.
//!
//! File databases are created on first use and switched to WAL mode for
//! better concurrent access. In-memory databases are pinned to a single
//! connection, since every SQLite connection to `:memory:` sees its own
//! database.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use log::{error, info};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error_handling::DatabaseError;
use crate::schema::{NamingStrategy, SqlValue};

use super::{Dialect, RelationalSink};

/// Writes batches to SQLite.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
    naming: NamingStrategy,
}

impl SqliteSink {
    /// Opens a sink for a `sqlite:` URL (`sqlite::memory:`, `sqlite:path` or
    /// `sqlite://path`). Query parameters are not supported.
    pub async fn connect(url: &str) -> Result<Self, DatabaseError> {
        let target = url
            .strip_prefix("sqlite:")
            .unwrap_or(url)
            .trim_start_matches("//");
        if target == ":memory:" || target.is_empty() {
            return Self::in_memory().await;
        }
        Self::open_with_path(Path::new(target)).await
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                error!("Failed to open in-memory database: {e}");
                DatabaseError::SqlError(e)
            })?;
        Ok(Self::from_pool(pool))
    }

    /// Opens (creating if needed) a database file and enables WAL mode.
    pub async fn open_with_path(db_path: &Path) -> Result<Self, DatabaseError> {
        let db_path_str = db_path.to_string_lossy().to_string();
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&db_path_str)
        {
            Ok(_) => info!("Database file created successfully."),
            Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
                info!("Database file already exists.")
            }
            Err(e) => {
                error!("Failed to create database file: {e}");
                return Err(DatabaseError::Rejected(format!(
                    "cannot create {}: {}",
                    db_path_str, e
                )));
            }
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}", db_path_str))
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {e}");
                DatabaseError::SqlError(e)
            })?;

        // Enable WAL mode
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await
            .map_err(|e| {
                error!("Failed to set WAL mode: {e}");
                DatabaseError::SqlError(e)
            })?;

        Ok(Self::from_pool(pool))
    }

    /// Wraps a pool shared with the rest of the application.
    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteSink {
            pool,
            naming: NamingStrategy::default(),
        }
    }

    /// Replaces the naming rules used for schema introspection.
    pub fn with_naming(mut self, naming: NamingStrategy) -> Self {
        self.naming = naming;
        self
    }

    /// The underlying pool, for queries outside the saver.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RelationalSink for SqliteSink {
    async fn execute(&self, sql: &str, args: Vec<SqlValue>) -> Result<u64, DatabaseError> {
        let mut query = sqlx::query(sql);
        for value in args {
            query = match value {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Bool(v) => query.bind(v),
                SqlValue::Int(v) => query.bind(v),
                // SQLite integers are signed 64-bit
                SqlValue::UInt(v) => match i64::try_from(v) {
                    Ok(v) => query.bind(v),
                    Err(_) => {
                        return Err(DatabaseError::ValueOutOfRange {
                            dialect: "SQLite",
                            value: v.to_string(),
                        })
                    }
                },
                SqlValue::Float(v) => query.bind(v),
                SqlValue::Text(v) => query.bind(v),
                SqlValue::Bytes(v) => query.bind(v),
                SqlValue::Timestamp(v) => query.bind(v),
                SqlValue::DateTime(v) => query.bind(v),
            };
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn naming(&self) -> NamingStrategy {
        self.naming.clone()
    }
}
