//! Shared test helpers for unit tests.
//!
//! `RecordingSink` stands in for a database: it records every statement it is
//! asked to execute and can be told to reject introspection or fail writes.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error_handling::{DatabaseError, SchemaError};
use crate::schema::{ShapeDescriptor, SqlValue};
use crate::sink::{parse_metadata, Dialect, RelationalSink, SchemaMetadata};

/// One executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

pub struct RecordingSink {
    dialect: Dialect,
    calls: Mutex<Vec<RecordedCall>>,
    attempts: AtomicUsize,
    introspections: AtomicUsize,
    reject_introspection: AtomicBool,
    introspection: Mutex<Option<SchemaMetadata>>,
    fail_next: AtomicUsize,
    delay_ms: AtomicU64,
}

impl RecordingSink {
    pub fn new(dialect: Dialect) -> Arc<Self> {
        Arc::new(RecordingSink {
            dialect,
            calls: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            introspections: AtomicUsize::new(0),
            reject_introspection: AtomicBool::new(false),
            introspection: Mutex::new(None),
            fail_next: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
        })
    }

    pub fn mysql() -> Arc<Self> {
        Self::new(Dialect::MySql)
    }

    pub fn sqlite() -> Arc<Self> {
        Self::new(Dialect::Sqlite)
    }

    /// Makes `introspect` fail so resolution takes the structural path.
    pub fn rejecting_introspection(self: Arc<Self>) -> Arc<Self> {
        self.reject_introspection.store(true, Ordering::SeqCst);
        self
    }

    /// Makes `introspect` return `metadata` regardless of the shape.
    pub fn with_introspection(self: Arc<Self>, metadata: SchemaMetadata) -> Arc<Self> {
        *self.introspection.lock().unwrap() = Some(metadata);
        self
    }

    /// Fails the next `count` executions.
    pub fn failing_next(self: Arc<Self>, count: usize) -> Arc<Self> {
        self.fail_next.store(count, Ordering::SeqCst);
        self
    }

    /// Makes every execution take `delay` before it succeeds or fails.
    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Successfully executed statements, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn introspection_count(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }

    /// Bound values of every successful call, in execution order.
    pub fn written_values(&self) -> Vec<SqlValue> {
        self.calls()
            .into_iter()
            .flat_map(|call| call.args)
            .collect()
    }
}

#[async_trait]
impl RelationalSink for RecordingSink {
    async fn execute(&self, sql: &str, args: Vec<SqlValue>) -> Result<u64, DatabaseError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DatabaseError::Rejected("injected failure".to_string()));
        }
        self.calls.lock().unwrap().push(RecordedCall {
            sql: sql.to_string(),
            args,
        });
        Ok(1)
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn introspect(&self, shape: &ShapeDescriptor) -> Result<SchemaMetadata, SchemaError> {
        self.introspections.fetch_add(1, Ordering::SeqCst);
        if self.reject_introspection.load(Ordering::SeqCst) {
            return Err(SchemaError::UnnamedType);
        }
        if let Some(metadata) = self.introspection.lock().unwrap().clone() {
            return Ok(metadata);
        }
        parse_metadata(shape, &self.naming())
    }
}
