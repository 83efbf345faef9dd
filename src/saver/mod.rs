//! The batch saver engine.
//!
//! A `BatchSaver<T>` buffers records of one type and writes them to a
//! relational sink as multi-row upserts. A flush happens when:
//! - `save` fills the buffer to the batch size (synchronous, errors returned)
//! - `flush` is called explicitly
//! - the background worker finds records older than the flush interval
//! - `close` drains the buffer
//!
//! Column resolution, accessor construction and the statement template all
//! happen once in `BatchSaver::new`.

mod buffer;
mod flush;
mod upsert;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use strum_macros::Display;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{SaverConfig, TimerFailurePolicy};
use crate::error_handling::SaverError;
use crate::schema::{build_accessors, resolve_columns, Record, ResolutionSource};

use buffer::{SaverCore, SaverLayout};
use upsert::UpsertTemplate;

pub use upsert::quote_identifier;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushResult {
    /// Rows written
    pub rows: usize,
    /// Statements executed; more than one when the batch exceeded the
    /// dialect's bind-parameter limit
    pub statements: usize,
}

/// Point-in-time counters of a saver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaverStats {
    /// Records currently buffered
    pub buffered: usize,
    /// Allocated buffer capacity
    pub capacity: usize,
    /// Rows written since the saver was built
    pub flushed_rows: u64,
    /// Successful flushes
    pub flushed_batches: u64,
    /// Flushes that returned an error, whatever happened to their rows
    pub failed_flushes: u64,
    /// Rows lost to failed flushes
    pub dropped_rows: u64,
    /// Rows put back into the buffer after a failed timer flush
    pub requeued_rows: u64,
}

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum FlushTrigger {
    Size,
    Timer,
    Explicit,
    Close,
}

type Worker = JoinHandle<Result<FlushResult, SaverError>>;

/// Buffers records of type `T` and writes them in batches.
///
/// Must be created inside a Tokio runtime: construction spawns the
/// background flush worker. Call `close` before dropping to observe the final
/// flush result; a saver dropped while open still drains in the background.
///
/// # Examples
///
/// ```no_run
/// # async fn demo() -> Result<(), batch_saver::SaverError> {
/// use batch_saver::{connect, BatchSaver, SaverConfig};
/// use batch_saver::models::UserAsset;
///
/// let sink = connect("sqlite::memory:").await?;
/// let saver: BatchSaver<UserAsset> =
///     BatchSaver::new(SaverConfig::new(sink).with_unique_keys(["asset_id"]))?;
/// saver.save(UserAsset::default()).await?;
/// saver.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct BatchSaver<T: Record> {
    core: Arc<SaverCore<T>>,
    shutdown: CancellationToken,
    worker: Mutex<Option<Worker>>,
}

impl<T: Record> BatchSaver<T> {
    /// Resolves `T` against the configured sink and starts the flush worker.
    ///
    /// # Errors
    ///
    /// - `SaverError::Construction` if `T` resolves to no columns
    /// - `SaverError::InvalidConfig` if a unique key is not a resolved column,
    ///   or if called outside a Tokio runtime
    pub fn new(config: SaverConfig) -> Result<Self, SaverError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            SaverError::InvalidConfig(format!("batch saver needs a Tokio runtime: {}", e))
        })?;

        let shape = T::shape();
        let resolved =
            resolve_columns(&shape.descriptor(), config.sink.as_ref()).map_err(|source| {
                SaverError::Construction {
                    type_name: shape.type_name().to_string(),
                    source,
                }
            })?;

        for key in &config.unique_keys {
            if !resolved.columns.contains(key) {
                return Err(SaverError::InvalidConfig(format!(
                    "unique key '{}' is not a column of {} (columns: {})",
                    key,
                    shape.type_name(),
                    resolved.columns.join(", ")
                )));
            }
        }

        let accessors = build_accessors(&shape, &resolved);
        let table = config
            .table_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| resolved.table_name.clone());
        let dialect = config.sink.dialect();
        let template = UpsertTemplate::new(
            dialect,
            &table,
            &resolved.columns,
            &config.unique_keys,
            resolved.auto_increment.as_deref(),
        );

        let batch_size = config.effective_batch_size();
        let flush_interval = config.effective_flush_interval();
        info!(
            "Batch saver for {} ready: table {} ({} columns via {}, {}), batch size {}, flush interval {:?}",
            shape.type_name(),
            table,
            resolved.columns.len(),
            resolved.source,
            dialect,
            batch_size,
            flush_interval
        );

        let core = Arc::new(SaverCore::new(
            config.sink,
            SaverLayout {
                table,
                columns: resolved.columns,
                auto_increment: resolved.auto_increment,
                source: resolved.source,
                unique_keys: config.unique_keys,
                accessors,
                template,
            },
            batch_size,
            flush_interval,
            config.timer_failure_policy,
        ));

        let shutdown = CancellationToken::new();
        let worker = runtime.spawn(flush::run_flush_loop(Arc::clone(&core), shutdown.clone()));

        Ok(BatchSaver {
            core,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Buffers one record, flushing synchronously once the batch is full.
    ///
    /// # Errors
    ///
    /// `SaverError::Closed` after `close`, or the `SaverError::Flush` of the
    /// size-triggered flush. A failed batch is not retried.
    pub async fn save(&self, record: T) -> Result<(), SaverError> {
        if self.core.push(record).await? {
            self.core.flush(FlushTrigger::Size).await?;
        }
        Ok(())
    }

    /// Writes everything currently buffered. An empty buffer is a no-op.
    pub async fn flush(&self) -> Result<FlushResult, SaverError> {
        self.core.flush(FlushTrigger::Explicit).await
    }

    /// Stops the flush worker and drains the buffer.
    ///
    /// Returns the result of the final flush. Later calls return `Ok(())`
    /// without flushing again.
    pub async fn close(&self) -> Result<(), SaverError> {
        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.take() else {
            return Ok(());
        };

        self.core.mark_closed().await;
        self.shutdown.cancel();
        match handle.await {
            Ok(drained) => drained.map(|_| ()),
            Err(e) => {
                error!("Flush worker for {} aborted: {}", self.core.table(), e);
                self.core.flush(FlushTrigger::Close).await?;
                Err(SaverError::Worker(e))
            }
        }
    }

    /// Snapshot of the buffer and flush counters.
    pub async fn stats(&self) -> SaverStats {
        self.core.stats().await
    }

    /// Target table, after any configured override.
    pub fn table_name(&self) -> &str {
        self.core.table()
    }

    /// Resolved columns in VALUES order.
    pub fn columns(&self) -> &[String] {
        &self.core.layout.columns
    }

    /// Column filled by the database; inserted but never updated on conflict.
    pub fn auto_increment_column(&self) -> Option<&str> {
        self.core.layout.auto_increment.as_deref()
    }

    /// Conflict keys, as configured.
    pub fn unique_keys(&self) -> &[String] {
        &self.core.layout.unique_keys
    }

    /// Whether columns came from sink metadata or the structural fallback.
    pub fn resolution_source(&self) -> ResolutionSource {
        self.core.layout.source
    }

    /// Buffer size that triggers a synchronous flush.
    pub fn batch_size(&self) -> usize {
        self.core.batch_size
    }

    /// Age after which the worker flushes a non-empty buffer.
    pub fn flush_interval(&self) -> Duration {
        self.core.flush_interval
    }

    /// What a failed timer flush does with its rows.
    pub fn timer_failure_policy(&self) -> TimerFailurePolicy {
        self.core.policy
    }
}

impl<T: Record> Drop for BatchSaver<T> {
    fn drop(&mut self) {
        if self.worker.get_mut().is_some() {
            warn!(
                "Batch saver for {} dropped without close; draining in the background",
                self.core.table()
            );
            self.shutdown.cancel();
        }
    }
}
