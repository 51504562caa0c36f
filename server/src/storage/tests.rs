#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared_types::{Action, Entry, EntryMetadata, TrackingRecord};

use super::entries::EntryStore;
use super::kv::{KeyValueBackend, KvError, KvItem, MemoryBackend, ScanOrder, WriteRequest};
use super::path;
use super::{PermitPool, WriteBatcher};
use crate::config::Config;

fn store_with_config(config: Config) -> (Arc<MemoryBackend>, EntryStore, Arc<Config>) {
    let backend = Arc::new(MemoryBackend::new());
    let config = Arc::new(config);
    let batcher = Arc::new(WriteBatcher::new(backend.clone(), PermitPool::new(8)));
    let store = EntryStore::new(backend.clone(), batcher, config.clone());
    (backend, store, config)
}

fn test_store() -> (Arc<MemoryBackend>, EntryStore, Arc<Config>) {
    store_with_config(Config::default())
}

#[tokio::test]
async fn upsert_makes_every_ancestor_listable() {
    let (_, store, _) = test_store();

    let report = store
        .upsert(&[Entry::new("a/b/c", "v", false)], "tester")
        .await;
    assert_eq!(report.get("a/b/c"), Some(&None));

    let top = store.list("a").await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].key, "b/");
    assert!(top[0].value.is_empty());

    let inner = store.list("a/b").await.unwrap();
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].key, "c");
    assert_eq!(inner[0].value, "v");

    let entry = store.retrieve("a/b/c").await.unwrap().unwrap();
    assert_eq!(entry.key, "a/b/c");
    assert_eq!(entry.value, "v");
}

#[tokio::test]
async fn retrieve_missing_key_is_not_an_error() {
    let (_, store, _) = test_store();
    assert!(store.retrieve("never/written").await.unwrap().is_none());
}

#[tokio::test]
async fn sibling_entries_share_one_marker_record() {
    let (backend, store, config) = test_store();

    store
        .upsert(
            &[
                Entry::new("ns/x", "1", false),
                Entry::new("ns/y", "2", false),
            ],
            "tester",
        )
        .await;

    // Two leaves plus a single deduplicated "ns/" marker.
    assert_eq!(backend.len(&config.entries_table), 3);
    assert_eq!(backend.len(&config.tracking_table), 2);
}

#[tokio::test]
async fn root_level_keys_use_the_empty_path_sentinel() {
    let (_, store, _) = test_store();

    store
        .upsert(&[Entry::new("rootkey", "v", false)], "tester")
        .await;

    let entries = store.list("").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, path::EMPTY_PATH);
    assert_eq!(entries[0].key, "rootkey");

    let entry = store.retrieve("rootkey").await.unwrap().unwrap();
    assert_eq!(entry.key, "rootkey");
}

#[tokio::test]
async fn keys_are_sanitized_into_the_default_namespace() {
    let config = Config {
        namespaces: vec!["team".to_string()],
        default_namespace: "team".to_string(),
        ..Config::default()
    };
    let (_, store, _) = store_with_config(config);

    assert_eq!(store.sanitize_key(" Widget/NAME "), "team/widget/name");
    assert_eq!(store.sanitize_key("/team/x/"), "team/x");

    store
        .upsert(&[Entry::new(" Widget/NAME ", "v", false)], "tester")
        .await;
    let entry = store.retrieve("team/widget/name").await.unwrap().unwrap();
    assert_eq!(entry.value, "v");
}

#[tokio::test]
async fn delete_cascades_to_all_descendants() {
    let (_, store, _) = test_store();

    store
        .upsert(
            &[
                Entry::new("a/b/c", "1", false),
                Entry::new("a/b/d/e", "2", false),
                Entry::new("a/other", "3", false),
            ],
            "tester",
        )
        .await;

    store.delete("a/b").await.unwrap();

    assert!(store.list("a/b").await.unwrap().is_empty());
    assert!(store.list("a/b/d").await.unwrap().is_empty());
    assert!(store.retrieve("a/b/c").await.unwrap().is_none());

    // The sibling and the deleted namespace's own marker.
    let remaining = store.list("a").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key, "other");
}

#[tokio::test]
async fn listing_hides_lock_sentinel_records() {
    let (backend, store, config) = test_store();

    store
        .upsert(&[Entry::new("ns/visible", "v", false)], "tester")
        .await;

    let record = super::Record {
        path: "ns".to_string(),
        key: "_lock".to_string(),
        value: String::new(),
        metadata: EntryMetadata::now("system", false, Action::Upsert),
    };
    backend
        .batch_write(
            &config.entries_table,
            vec![WriteRequest::Put(KvItem {
                partition: "ns".to_string(),
                sort: "_lock".to_string(),
                body: serde_json::to_value(&record).unwrap(),
            })],
        )
        .await
        .unwrap();

    let entries = store.list("ns").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "visible");
}

#[tokio::test]
async fn tracking_returns_history_newest_first() {
    let (backend, store, config) = test_store();

    for (timestamp, value) in [(100, "old"), (200, "new")] {
        let metadata = EntryMetadata {
            updated_at: timestamp,
            updated_by: "tester".to_string(),
            secure: false,
            action: Action::Upsert,
            hash: None,
        };
        let record = TrackingRecord {
            key: "ns/name".to_string(),
            timestamp,
            value: value.to_string(),
            metadata,
        };
        backend
            .batch_write(
                &config.tracking_table,
                vec![WriteRequest::Put(KvItem {
                    partition: "ns/name".to_string(),
                    sort: format!("{timestamp:020}"),
                    body: serde_json::to_value(&record).unwrap(),
                })],
            )
            .await
            .unwrap();
    }

    let history = store.tracking("ns/name").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].value, "new");
    assert_eq!(history[1].value, "old");
}

#[tokio::test]
async fn upsert_writes_one_tracking_record_per_mutation() {
    let (_, store, _) = test_store();

    store
        .upsert(&[Entry::new("ns/name", "v1", false)], "alice")
        .await;

    let history = store.tracking("ns/name").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].key, "ns/name");
    assert_eq!(history[0].value, "v1");
    assert_eq!(history[0].metadata.updated_by, "alice");
    assert_eq!(history[0].metadata.action, Action::Upsert);
}

/// Accepts writes except for partitions under `bad`, which are
/// reported back as unprocessed.
struct PartialBackend {
    inner: MemoryBackend,
}

#[async_trait]
impl KeyValueBackend for PartialBackend {
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, KvError> {
        let (rejected, accepted): (Vec<_>, Vec<_>) = requests
            .into_iter()
            .partition(|r| r.coordinates().0.starts_with("bad"));
        self.inner.batch_write(table, accepted).await?;
        Ok(rejected)
    }

    async fn get_item(
        &self,
        table: &str,
        partition: &str,
        sort: &str,
    ) -> Result<Option<KvItem>, KvError> {
        self.inner.get_item(table, partition, sort).await
    }

    async fn query(
        &self,
        table: &str,
        partition: &str,
        order: ScanOrder,
    ) -> Result<Vec<KvItem>, KvError> {
        self.inner.query(table, partition, order).await
    }

    async fn scan(&self, table: &str) -> Result<Vec<KvItem>, KvError> {
        self.inner.scan(table).await
    }
}

#[tokio::test(start_paused = true)]
async fn one_failed_key_does_not_block_its_siblings() {
    let backend = Arc::new(PartialBackend {
        inner: MemoryBackend::new(),
    });
    let config = Arc::new(Config::default());
    let batcher = Arc::new(
        WriteBatcher::new(backend.clone(), PermitPool::new(8))
            .with_budget(Duration::from_secs(1)),
    );
    let store = EntryStore::new(backend, batcher, config);

    let report = store
        .upsert(
            &[
                Entry::new("good/x", "1", false),
                Entry::new("bad/y", "2", false),
            ],
            "tester",
        )
        .await;

    assert_eq!(report.get("good/x"), Some(&None));
    let error = report.get("bad/y").unwrap().as_ref().unwrap();
    assert!(error.contains("timed out"));

    let entry = store.retrieve("good/x").await.unwrap().unwrap();
    assert_eq!(entry.value, "1");
}
