//! Configuration types and CLI options.
//!
//! This module defines the per-engine configuration consumed by
//! `BatchSaver::new` and the enums and structs used for command-line argument
//! parsing in the loader binary.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    BATCH_SIZE_ENV, DEFAULT_BATCH_SIZE, DEFAULT_DB_URL, DEFAULT_FLUSH_INTERVAL,
    FLUSH_INTERVAL_MS_ENV,
};
use crate::sink::RelationalSink;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// What the background timer does with a batch whose write failed.
///
/// Size-triggered and explicit flushes always hand the error to their caller
/// and never requeue; this policy only governs timer-triggered flushes, which
/// have no caller to report to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TimerFailurePolicy {
    /// Log the failure and drop the batch (at-most-once).
    #[default]
    Discard,
    /// Put the batch back at the front of the buffer and retry on the next tick.
    Requeue,
}

/// Configuration for one batch saver.
///
/// Zero values for `batch_size` or `flush_interval` are replaced by the
/// defaults when the saver is built.
///
/// # Examples
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use std::time::Duration;
/// use batch_saver::{connect, SaverConfig};
///
/// let sink = connect("sqlite::memory:").await?;
/// let config = SaverConfig::new(sink)
///     .with_unique_keys(["asset_id"])
///     .with_batch_size(500)
///     .with_flush_interval(Duration::from_secs(2));
/// # let _ = config;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SaverConfig {
    /// Relational sink the upserts are executed against
    pub sink: Arc<dyn RelationalSink>,

    /// Table name override; resolved from the record shape when `None`
    pub table_name: Option<String>,

    /// Unique-key columns; enables the upsert clause when non-empty
    pub unique_keys: Vec<String>,

    /// Buffered record count that triggers a synchronous flush
    pub batch_size: usize,

    /// Background flush period
    pub flush_interval: Duration,

    /// Handling of failed timer-triggered flushes
    pub timer_failure_policy: TimerFailurePolicy,
}

impl SaverConfig {
    /// Creates a configuration with default batch size and flush interval.
    pub fn new(sink: Arc<dyn RelationalSink>) -> Self {
        Self {
            sink,
            table_name: None,
            unique_keys: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            timer_failure_policy: TimerFailurePolicy::default(),
        }
    }

    /// Creates a configuration whose batch size and flush interval come from
    /// `BATCH_SAVER_BATCH_SIZE` and `BATCH_SAVER_FLUSH_INTERVAL_MS`.
    ///
    /// Missing variables keep the defaults; unparsable ones are logged and
    /// ignored.
    pub fn from_env(sink: Arc<dyn RelationalSink>) -> Self {
        let mut config = Self::new(sink);
        if let Some(size) = read_env_number(BATCH_SIZE_ENV) {
            config.batch_size = size as usize;
        }
        if let Some(ms) = read_env_number(FLUSH_INTERVAL_MS_ENV) {
            config.flush_interval = Duration::from_millis(ms);
        }
        config
    }

    /// Overrides the resolved table name.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Sets the conflict keys. They must be resolved column names.
    pub fn with_unique_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the batch size; zero means the default.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the timer period; zero means the default.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Sets what a failed timer flush does with its rows.
    pub fn with_timer_failure_policy(mut self, policy: TimerFailurePolicy) -> Self {
        self.timer_failure_policy = policy;
        self
    }

    /// Batch size with the zero value mapped to the default.
    pub(crate) fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }

    /// Flush interval with the zero value mapped to the default.
    pub(crate) fn effective_flush_interval(&self) -> Duration {
        if self.flush_interval.is_zero() {
            DEFAULT_FLUSH_INTERVAL
        } else {
            self.flush_interval
        }
    }
}

impl fmt::Debug for SaverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaverConfig")
            .field("dialect", &self.sink.dialect())
            .field("table_name", &self.table_name)
            .field("unique_keys", &self.unique_keys)
            .field("batch_size", &self.batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("timer_failure_policy", &self.timer_failure_policy)
            .finish()
    }
}

fn read_env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}

/// Command-line options for the `batch_saver` loader binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "batch_saver",
    about = "Bulk-load JSON-lines user asset records through a batching upsert saver"
)]
pub struct Opt {
    /// JSON-lines file with one user asset per line
    #[arg(value_parser)]
    pub file: PathBuf,

    /// Database URL (mysql://... or sqlite:...)
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DB_URL)]
    pub db: String,

    /// Table name override
    #[arg(long)]
    pub table: Option<String>,

    /// Unique-key column (repeatable); defaults to asset_id
    #[arg(long = "unique-key")]
    pub unique_keys: Vec<String>,

    /// Records per batch [default: BATCH_SAVER_BATCH_SIZE or 1000]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Background flush interval in milliseconds
    /// [default: BATCH_SAVER_FLUSH_INTERVAL_MS or 5000]
    #[arg(long)]
    pub flush_interval_ms: Option<u64>,

    /// What to do with a batch whose timer-triggered write failed
    #[arg(long, value_enum, default_value_t = TimerFailurePolicy::Discard)]
    pub on_timer_failure: TimerFailurePolicy,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}
