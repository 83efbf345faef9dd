//! Shared state of one saver: the resolved layout and the record buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::TimerFailurePolicy;
use crate::error_handling::SaverError;
use crate::schema::{FieldAccessor, ResolutionSource};
use crate::sink::RelationalSink;

use super::upsert::UpsertTemplate;
use super::SaverStats;

struct BufferState<T> {
    records: Vec<T>,
    last_flush: Instant,
    closed: bool,
}

/// Everything resolved once at construction.
pub(super) struct SaverLayout<T> {
    pub table: String,
    pub columns: Vec<String>,
    pub auto_increment: Option<String>,
    pub source: ResolutionSource,
    pub unique_keys: Vec<String>,
    pub accessors: Vec<Option<FieldAccessor<T>>>,
    pub template: UpsertTemplate,
}

#[derive(Default)]
pub(super) struct Counters {
    pub flushed_rows: AtomicU64,
    pub flushed_batches: AtomicU64,
    pub failed_flushes: AtomicU64,
    pub dropped_rows: AtomicU64,
    pub requeued_rows: AtomicU64,
}

impl Counters {
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// State shared between a `BatchSaver` handle and its flush worker.
///
/// The buffer mutex only ever guards in-memory work. Statements are executed
/// after the lock has been released. `flush_gate` is held for a whole flush,
/// from taking the batch to writing or requeueing it, so flushes of one saver
/// never overlap and rows reach the sink in the order they were saved.
/// `push` does not touch the gate.
pub(super) struct SaverCore<T> {
    pub sink: Arc<dyn RelationalSink>,
    pub layout: SaverLayout<T>,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub policy: TimerFailurePolicy,
    pub counters: Counters,
    pub flush_gate: Mutex<()>,
    state: Mutex<BufferState<T>>,
}

impl<T> SaverCore<T> {
    pub fn new(
        sink: Arc<dyn RelationalSink>,
        layout: SaverLayout<T>,
        batch_size: usize,
        flush_interval: Duration,
        policy: TimerFailurePolicy,
    ) -> Self {
        SaverCore {
            sink,
            layout,
            batch_size,
            flush_interval,
            policy,
            counters: Counters::default(),
            flush_gate: Mutex::new(()),
            state: Mutex::new(BufferState {
                records: Vec::with_capacity(batch_size),
                last_flush: Instant::now(),
                closed: false,
            }),
        }
    }

    pub fn table(&self) -> &str {
        &self.layout.table
    }

    /// Appends a record and reports whether the buffer reached the batch size.
    pub async fn push(&self, record: T) -> Result<bool, SaverError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(SaverError::Closed(self.layout.table.clone()));
        }
        state.records.push(record);
        Ok(state.records.len() >= self.batch_size)
    }

    /// Takes every buffered record, leaving the allocation in place.
    ///
    /// Returns `None` without touching the flush time when the buffer is empty.
    pub async fn take_batch(&self) -> Option<Vec<T>> {
        let mut state = self.state.lock().await;
        if state.records.is_empty() {
            return None;
        }
        let batch: Vec<T> = state.records.drain(..).collect();
        state.last_flush = Instant::now();
        Some(batch)
    }

    /// Puts a failed batch back in front of records saved since it was taken.
    pub async fn requeue(&self, mut batch: Vec<T>) {
        let mut state = self.state.lock().await;
        batch.append(&mut state.records);
        state.records = batch;
    }

    /// True when records are waiting and the last flush is older than the
    /// flush interval.
    pub async fn is_due(&self) -> bool {
        let state = self.state.lock().await;
        !state.records.is_empty() && state.last_flush.elapsed() > self.flush_interval
    }

    /// Stops accepting records. Already buffered records are still flushed.
    pub async fn mark_closed(&self) {
        self.state.lock().await.closed = true;
    }

    pub async fn stats(&self) -> SaverStats {
        let (buffered, capacity) = {
            let state = self.state.lock().await;
            (state.records.len(), state.records.capacity())
        };
        SaverStats {
            buffered,
            capacity,
            flushed_rows: self.counters.flushed_rows.load(Ordering::Relaxed),
            flushed_batches: self.counters.flushed_batches.load(Ordering::Relaxed),
            failed_flushes: self.counters.failed_flushes.load(Ordering::Relaxed),
            dropped_rows: self.counters.dropped_rows.load(Ordering::Relaxed),
            requeued_rows: self.counters.requeued_rows.load(Ordering::Relaxed),
        }
    }
}
