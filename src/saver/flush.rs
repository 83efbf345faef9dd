//! Flush logic and the background flush worker.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::TimerFailurePolicy;
use crate::error_handling::SaverError;
use crate::schema::Record;

use super::buffer::{Counters, SaverCore};
use super::upsert::{execute_upsert, UpsertFailure};
use super::{FlushResult, FlushTrigger};

impl<T: Record> SaverCore<T> {
    /// Writes every buffered record.
    ///
    /// The buffer is swapped out under the lock and the statements run after it
    /// is released, so producers are never blocked on database I/O. Rows that
    /// were not written are dropped, except that a failed timer flush under
    /// `TimerFailurePolicy::Requeue` puts them back in front of the buffer.
    ///
    /// Concurrent flushes wait on the flush gate. A flush that queued behind a
    /// failed timer flush therefore sees the requeued rows ahead of its own.
    pub async fn flush(&self, trigger: FlushTrigger) -> Result<FlushResult, SaverError> {
        let _gate = self.flush_gate.lock().await;
        let Some(mut batch) = self.take_batch().await else {
            return Ok(FlushResult::default());
        };

        let count = batch.len();
        debug!(
            "Flushing batch of {} records into {} ({} flush)",
            count,
            self.table(),
            trigger
        );

        let layout = &self.layout;
        match execute_upsert(
            self.sink.as_ref(),
            &layout.template,
            &layout.accessors,
            &batch,
        )
        .await
        {
            Ok(result) => {
                Counters::add(&self.counters.flushed_rows, result.rows);
                Counters::add(&self.counters.flushed_batches, 1);
                debug!(
                    "Flushed {} records into {} using {} statement(s)",
                    result.rows,
                    self.table(),
                    result.statements
                );
                Ok(result)
            }
            Err(UpsertFailure { written, source }) => {
                Counters::add(&self.counters.flushed_rows, written.rows);
                Counters::add(&self.counters.failed_flushes, 1);
                let unwritten = batch.split_off(written.rows);
                let lost = unwritten.len();

                if trigger == FlushTrigger::Timer && self.policy == TimerFailurePolicy::Requeue {
                    Counters::add(&self.counters.requeued_rows, lost);
                    self.requeue(unwritten).await;
                } else {
                    Counters::add(&self.counters.dropped_rows, lost);
                }

                Err(SaverError::Flush {
                    table: self.table().to_string(),
                    rows: lost,
                    source,
                })
            }
        }
    }
}

/// Runs the periodic flush until `shutdown` is cancelled, then performs the
/// final drain and returns its result.
///
/// A tick flushes only when records are waiting and the last flush (of any
/// kind) is older than the flush interval. Errors from ticks have no caller
/// and are logged.
pub(super) async fn run_flush_loop<T: Record>(
    core: Arc<SaverCore<T>>,
    shutdown: CancellationToken,
) -> Result<FlushResult, SaverError> {
    let period = core.flush_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if !core.is_due().await {
                    continue;
                }
                if let Err(e) = core.flush(FlushTrigger::Timer).await {
                    match core.policy {
                        TimerFailurePolicy::Discard => {
                            error!("Timer flush failed, batch discarded: {}", e)
                        }
                        TimerFailurePolicy::Requeue => {
                            error!("Timer flush failed, batch requeued: {}", e)
                        }
                    }
                }
            }
        }
    }

    core.mark_closed().await;
    let result = core.flush(FlushTrigger::Close).await;
    match &result {
        Ok(drained) if drained.rows > 0 => info!(
            "Drained {} buffered records into {} on close",
            drained.rows,
            core.table()
        ),
        Ok(_) => debug!("Flush worker for {} stopped with an empty buffer", core.table()),
        Err(e) => error!("Final flush on close failed: {}", e),
    }
    result
}
