//! Configuration constants.
//!
//! This module defines the defaults used when a saver is created without
//! explicit values, plus the names of the environment variables that the
//! deployment's configuration source exports.

use std::time::Duration;

/// Number of buffered records that triggers a synchronous flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Period of the background flush timer.
///
/// A non-empty buffer that has not been flushed for longer than this is
/// written out on the next tick.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Soft-delete column, never written by a saver.
pub const SOFT_DELETE_COLUMN: &str = "deleted_at";

/// Environment variable overriding the batch size.
pub const BATCH_SIZE_ENV: &str = "BATCH_SAVER_BATCH_SIZE";

/// Environment variable overriding the flush interval (milliseconds).
pub const FLUSH_INTERVAL_MS_ENV: &str = "BATCH_SAVER_FLUSH_INTERVAL_MS";

/// Default database URL for the loader binary.
pub const DEFAULT_DB_URL: &str = "sqlite:./batch_saver.db";

// Bind-parameter ceilings per statement
/// MySQL prepared statements accept at most 65535 placeholders.
pub const MYSQL_MAX_BIND_PARAMS: usize = 65_535;
/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` since 3.32.
pub const SQLITE_MAX_BIND_PARAMS: usize = 32_766;

/// Upsert key used by the loader when no `--unique-key` is given.
pub const DEFAULT_UNIQUE_KEY: &str = "asset_id";
