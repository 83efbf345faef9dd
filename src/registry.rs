//! Registry of batch savers, one per record type.
//!
//! Savers are keyed by `std::any::type_name`. Each key owns a once-cell, so
//! concurrent first requests for a type build exactly one saver without
//! holding the map lock while it is built.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info, warn};
use tokio::sync::{Mutex, OnceCell};

use crate::config::SaverConfig;
use crate::error_handling::SaverError;
use crate::saver::BatchSaver;
use crate::schema::Record;

static GLOBAL: LazyLock<SaverRegistry> = LazyLock::new(SaverRegistry::new);

/// Type-erased close handle kept next to each saver.
#[async_trait]
trait ManagedSaver: Send + Sync {
    async fn close(&self) -> Result<(), SaverError>;
}

#[async_trait]
impl<T: Record> ManagedSaver for BatchSaver<T> {
    async fn close(&self) -> Result<(), SaverError> {
        BatchSaver::close(self).await
    }
}

struct Registered {
    any: Arc<dyn Any + Send + Sync>,
    saver: Arc<dyn ManagedSaver>,
}

impl Registered {
    fn new<T: Record>(saver: Arc<BatchSaver<T>>) -> Self {
        Registered {
            any: saver.clone(),
            saver,
        }
    }
}

type Slot = Arc<OnceCell<Registered>>;

/// Hands out one shared `BatchSaver<T>` per record type.
///
/// Use `SaverRegistry::global()` for the process-wide instance, or create and
/// pass around your own.
#[derive(Default)]
pub struct SaverRegistry {
    savers: Mutex<HashMap<String, Slot>>,
}

impl SaverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static SaverRegistry {
        &GLOBAL
    }

    /// Returns the saver for `T`, building it from `config` on first use.
    ///
    /// `config` is ignored when the saver already exists.
    ///
    /// # Errors
    ///
    /// Construction errors from `BatchSaver::new`. A failed construction is
    /// not cached; the next call tries again.
    pub async fn get_or_create<T: Record>(
        &self,
        config: SaverConfig,
    ) -> Result<Arc<BatchSaver<T>>, SaverError> {
        self.get_or_create_keyed(std::any::type_name::<T>(), config)
            .await
    }

    pub(crate) async fn get_or_create_keyed<T: Record>(
        &self,
        key: &str,
        config: SaverConfig,
    ) -> Result<Arc<BatchSaver<T>>, SaverError> {
        loop {
            let slot = {
                let mut savers = self.savers.lock().await;
                Arc::clone(savers.entry(key.to_string()).or_default())
            };

            let build = config.clone();
            let registered = match slot
                .get_or_try_init(|| async move {
                    let saver = Arc::new(BatchSaver::<T>::new(build)?);
                    Ok::<_, SaverError>(Registered::new(saver))
                })
                .await
            {
                Ok(registered) => registered,
                Err(e) => {
                    self.discard_empty_slot(key, &slot).await;
                    return Err(e);
                }
            };

            if let Ok(saver) = Arc::clone(&registered.any).downcast::<BatchSaver<T>>() {
                return Ok(saver);
            }

            warn!(
                "Saver registered under {} has a different record type; replacing it",
                key
            );
            // Only the caller that unlinks the slot closes it. Everyone else
            // goes round again and shares the replacement slot.
            let evicted = {
                let mut savers = self.savers.lock().await;
                if savers.get(key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                    savers.remove(key);
                    true
                } else {
                    false
                }
            };
            if evicted {
                if let Err(e) = registered.saver.close().await {
                    error!("Closing replaced saver for {} failed: {}", key, e);
                }
            }
        }
    }

    /// Unlinks a slot whose construction failed, unless another caller still
    /// holds it and may yet fill it.
    async fn discard_empty_slot(&self, key: &str, slot: &Slot) {
        let mut savers = self.savers.lock().await;
        let unused = savers.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && !slot.initialized() && Arc::strong_count(slot) == 2
        });
        if unused {
            savers.remove(key);
        }
    }

    /// Closes every saver concurrently and empties the registry.
    ///
    /// One failing saver does not stop the others; failures are logged and
    /// returned with their type key.
    pub async fn close_all(&self) -> Vec<(String, SaverError)> {
        let drained: Vec<(String, Slot)> = self.savers.lock().await.drain().collect();
        let count = drained.len();

        let closes = drained.into_iter().filter_map(|(key, slot)| {
            let saver = Arc::clone(&slot.get()?.saver);
            Some(async move { (key, saver.close().await) })
        });
        let failures: Vec<(String, SaverError)> = join_all(closes)
            .await
            .into_iter()
            .filter_map(|(key, result)| result.err().map(|e| (key, e)))
            .collect();

        for (key, e) in &failures {
            error!("Failed to close saver for {}: {}", key, e);
        }
        info!(
            "Closed {} batch saver(s), {} failed",
            count,
            failures.len()
        );
        failures
    }

    /// Number of registered types. Slots still under construction do not count.
    pub async fn len(&self) -> usize {
        self.savers
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// True when no saver is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Registered type keys, sorted.
    pub async fn type_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .savers
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

/// Saves `record` through the registry's saver for `T`, creating it if needed.
pub async fn save_model<T: Record>(
    registry: &SaverRegistry,
    config: SaverConfig,
    record: T,
) -> Result<(), SaverError> {
    registry.get_or_create::<T>(config).await?.save(record).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::schema::RecordShape;
    use crate::test_helpers::RecordingSink;

    struct Note {
        id: i64,
        body: String,
    }

    impl Record for Note {
        fn shape() -> RecordShape<Self> {
            RecordShape::new("Note")
                .field("ID", |n: &Note| &n.id)
                .field("Body", |n: &Note| &n.body)
        }
    }

    struct Tag {
        label: String,
    }

    impl Record for Tag {
        fn shape() -> RecordShape<Self> {
            RecordShape::new("Tag").field("Label", |t: &Tag| &t.label)
        }
    }

    fn note(id: i64) -> Note {
        Note {
            id,
            body: format!("note {}", id),
        }
    }

    fn config(sink: &Arc<RecordingSink>) -> SaverConfig {
        SaverConfig::new(sink.clone())
            .with_batch_size(100)
            .with_flush_interval(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_same_type_returns_same_saver() {
        let sink = RecordingSink::mysql();
        let registry = SaverRegistry::new();

        let first = registry.get_or_create::<Note>(config(&sink)).await.unwrap();
        let second = registry.get_or_create::<Note>(config(&sink)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(sink.introspection_count(), 1);
        assert_eq!(registry.len().await, 1);
        registry.close_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_requests_build_one_saver() {
        let sink = RecordingSink::mysql();
        let registry = Arc::new(SaverRegistry::new());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let config = config(&sink);
                tokio::spawn(async move { registry.get_or_create::<Note>(config).await })
            })
            .collect();

        let mut savers = Vec::new();
        for task in tasks {
            savers.push(task.await.unwrap().unwrap());
        }
        assert!(savers.iter().all(|s| Arc::ptr_eq(s, &savers[0])));
        assert_eq!(sink.introspection_count(), 1);
        registry.close_all().await;
    }

    #[tokio::test]
    async fn test_types_get_separate_savers() {
        let sink = RecordingSink::mysql();
        let registry = SaverRegistry::new();
        assert!(registry.is_empty().await);

        let notes = registry.get_or_create::<Note>(config(&sink)).await.unwrap();
        let tags = registry.get_or_create::<Tag>(config(&sink)).await.unwrap();
        assert_eq!(notes.table_name(), "notes");
        assert_eq!(tags.table_name(), "tags");

        let keys = registry.type_keys().await;
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().any(|k| k.ends_with("Note")));
        assert!(keys.iter().any(|k| k.ends_with("Tag")));
        registry.close_all().await;
    }

    #[tokio::test]
    async fn test_mismatched_type_is_evicted_and_drained() {
        let sink = RecordingSink::mysql();
        let registry = SaverRegistry::new();

        let notes = registry
            .get_or_create_keyed::<Note>("shared", config(&sink))
            .await
            .unwrap();
        notes.save(note(1)).await.unwrap();

        let tags = registry
            .get_or_create_keyed::<Tag>("shared", config(&sink))
            .await
            .unwrap();
        assert_eq!(tags.table_name(), "tags");
        assert_eq!(registry.len().await, 1);

        // the evicted saver was closed and its buffer written
        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].sql.starts_with("INSERT INTO `notes`"));
        assert!(notes.save(note(2)).await.is_err());

        let again = registry
            .get_or_create_keyed::<Tag>("shared", config(&sink))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&tags, &again));
        registry.close_all().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mismatched_callers_share_one_replacement() {
        let sink = RecordingSink::mysql();
        let registry = Arc::new(SaverRegistry::new());

        let notes = registry
            .get_or_create_keyed::<Note>("shared", config(&sink))
            .await
            .unwrap();
        notes.save(note(1)).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let config = config(&sink);
                tokio::spawn(async move {
                    registry
                        .get_or_create_keyed::<Tag>("shared", config)
                        .await
                })
            })
            .collect();

        let mut tags = Vec::new();
        for task in tasks {
            tags.push(task.await.unwrap().unwrap());
        }
        assert!(tags.iter().all(|t| Arc::ptr_eq(t, &tags[0])));
        assert_eq!(registry.len().await, 1);

        // the stale saver was drained exactly once
        let note_writes = sink
            .calls()
            .iter()
            .filter(|c| c.sql.starts_with("INSERT INTO `notes`"))
            .count();
        assert_eq!(note_writes, 1);

        // the replacement is the one close_all drains
        tags[0]
            .save(Tag {
                label: "kept".to_string(),
            })
            .await
            .unwrap();
        assert!(registry.close_all().await.is_empty());
        assert!(sink
            .calls()
            .iter()
            .any(|c| c.sql.starts_with("INSERT INTO `tags`")));
    }

    #[tokio::test]
    async fn test_failed_construction_is_not_cached() {
        let sink = RecordingSink::mysql();
        let registry = SaverRegistry::new();

        let bad = config(&sink).with_unique_keys(["missing"]);
        assert!(registry.get_or_create::<Note>(bad).await.is_err());
        assert_eq!(registry.len().await, 0);
        assert!(registry.is_empty().await);
        assert!(registry.type_keys().await.is_empty());
        assert!(registry.savers.lock().await.is_empty());

        assert!(registry.get_or_create::<Note>(config(&sink)).await.is_ok());
        assert_eq!(registry.len().await, 1);
        registry.close_all().await;
    }

    #[tokio::test]
    async fn test_close_all_drains_every_saver_and_collects_failures() {
        let sink = RecordingSink::mysql();
        let failing = RecordingSink::mysql();
        let registry = SaverRegistry::new();

        save_model(&registry, config(&sink), note(1)).await.unwrap();
        save_model(&registry, config(&sink), note(2)).await.unwrap();
        save_model(
            &registry,
            config(&failing),
            Tag {
                label: "x".to_string(),
            },
        )
        .await
        .unwrap();
        failing.fail_next(1);

        let failures = registry.close_all().await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.ends_with("Tag"));
        assert!(failures[0].1.is_flush_error());

        assert_eq!(sink.calls().len(), 1);
        assert_eq!(sink.calls()[0].args.len(), 4);
        assert!(registry.is_empty().await);
        assert!(registry.close_all().await.is_empty());
    }

    #[test]
    fn test_global_is_a_singleton() {
        assert!(std::ptr::eq(SaverRegistry::global(), SaverRegistry::global()));
    }
}
