//! The hierarchical key/value engine: leaf records, directory markers,
//! tracking history.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared_types::{Action, Entry, EntryMetadata, TrackingRecord};
use tracing::warn;

use super::batch::WriteBatcher;
use super::error::StorageError;
use super::kv::{KeyValueBackend, KvItem, ScanOrder, WriteRequest};
use super::path;
use crate::config::Config;

/// The persisted shape. Leaf records carry a value and a key without a
/// trailing slash; directory markers end in `/` and carry no value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub path: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub metadata: EntryMetadata,
}

/// Per-key outcome of a batched upsert: `None` is success.
pub type UpsertReport = HashMap<String, Option<String>>;

pub struct EntryStore {
    backend: Arc<dyn KeyValueBackend>,
    batcher: Arc<WriteBatcher>,
    config: Arc<Config>,
}

impl EntryStore {
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        batcher: Arc<WriteBatcher>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            backend,
            batcher,
            config,
        }
    }

    /// Normalizes a namespaced key for storage: lower-cased, trimmed,
    /// stripped of surrounding slashes, and prefixed with the default
    /// namespace unless its first segment is already an allowed one.
    pub fn sanitize_key(&self, key: &str) -> String {
        let key = key.trim().to_lowercase();
        let key = key.trim_matches('/').to_string();
        if key.is_empty() {
            return key;
        }
        let allowed = &self.config.namespaces;
        if allowed.is_empty() || self.config.default_namespace.is_empty() {
            return key;
        }
        let in_namespace = allowed
            .iter()
            .any(|ns| key == *ns || key.starts_with(&format!("{ns}/")));
        if in_namespace {
            key
        } else {
            format!("{}/{}", self.config.default_namespace, key)
        }
    }

    /// Inserts or updates a batch of entries.
    ///
    /// Every entry produces one leaf record, one marker record per
    /// ancestor prefix, and one tracking record. Leaf and marker
    /// records are deduplicated across the batch by their composite
    /// path+key, then the entry table and the tracking table are
    /// written as two independent streams. A tracking failure is
    /// logged, never surfaced; per-key results come from diffing the
    /// accepted record set against the input.
    pub async fn upsert(&self, entries: &[Entry], actor: &str) -> UpsertReport {
        let mut report: UpsertReport = HashMap::new();
        let mut records: HashMap<(String, String), Record> = HashMap::new();
        let mut tracking: Vec<WriteRequest> = Vec::new();
        let mut owners: Vec<(String, Vec<(String, String)>)> = Vec::new();

        for entry in entries {
            let full = self.sanitize_key(&entry.key);
            if full.is_empty() {
                report.insert(entry.key.clone(), Some(StorageError::EmptyKey.to_string()));
                continue;
            }

            let metadata = EntryMetadata::now(actor, entry.secure, Action::Upsert);
            let leaf_path = path::path_without_key(&full);
            let leaf_key = path::base_key(&full);
            let mut composites = vec![(leaf_path.clone(), leaf_key.clone())];
            records.insert(
                (leaf_path.clone(), leaf_key.clone()),
                Record {
                    path: leaf_path,
                    key: leaf_key,
                    value: entry.value.clone(),
                    metadata: metadata.clone(),
                },
            );

            for prefix in path::prefixes(&full) {
                let marker_path = path::path_without_key(&prefix);
                let marker_key = format!("{}/", path::base_key(&prefix));
                let composite = (marker_path.clone(), marker_key.clone());
                records.entry(composite.clone()).or_insert(Record {
                    path: marker_path,
                    key: marker_key,
                    value: String::new(),
                    metadata: metadata.clone(),
                });
                composites.push(composite);
            }

            match self.tracking_item(&full, entry, &metadata) {
                Ok(item) => tracking.push(WriteRequest::Put(item)),
                Err(err) => warn!(key = %full, %err, "skipping tracking record"),
            }
            owners.push((entry.key.clone(), composites));
            report.insert(entry.key.clone(), None);
        }

        let mut requests: Vec<WriteRequest> = Vec::with_capacity(records.len());
        for ((partition, sort), record) in records {
            match serde_json::to_value(&record) {
                Ok(body) => requests.push(WriteRequest::Put(KvItem {
                    partition,
                    sort,
                    body,
                })),
                Err(err) => warn!(%err, "could not serialize record"),
            }
        }

        let (leaf_result, tracking_result) = tokio::join!(
            self.batcher.write(&self.config.entries_table, requests),
            self.batcher.write(&self.config.tracking_table, tracking),
        );

        if let Err(failure) = tracking_result {
            warn!(error = %failure.error, "tracking write failed");
        }

        if let Err(failure) = leaf_result {
            let unresolved: HashSet<(String, String)> = failure
                .unresolved
                .iter()
                .map(|request| {
                    let (partition, sort) = request.coordinates();
                    (partition.to_string(), sort.to_string())
                })
                .collect();
            let message = failure.error.to_string();
            for (input_key, composites) in owners {
                if composites.iter().any(|c| unresolved.contains(c)) {
                    report.insert(input_key, Some(message.clone()));
                }
            }
        }

        report
    }

    /// Consistent point read of a leaf record; absence is not an error.
    pub async fn retrieve(&self, key: &str) -> Result<Option<Entry>, StorageError> {
        let key = key.trim().trim_matches('/');
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        let partition = path::path_without_key(key);
        let sort = path::base_key(key);
        let item = self
            .backend
            .get_item(&self.config.entries_table, &partition, &sort)
            .await?;
        match item {
            None => Ok(None),
            Some(item) => {
                let record: Record =
                    serde_json::from_value(item.body).map_err(StorageError::record)?;
                Ok(Some(Entry {
                    path: String::new(),
                    key: path::concat(&record.path, &record.key),
                    value: record.value,
                    secure: record.metadata.secure,
                }))
            }
        }
    }

    /// All records stored directly under `prefix`, markers included
    /// (their keys end with `/`). Keys behind the lock sentinel are
    /// filtered out.
    pub async fn list(&self, prefix: &str) -> Result<Vec<Entry>, StorageError> {
        let prefix = prefix.trim().trim_end_matches('/');
        let partition = path::escape_empty_path(prefix);

        let items = self
            .backend
            .query(&self.config.entries_table, &partition, ScanOrder::Ascending)
            .await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let record: Record = serde_json::from_value(item.body).map_err(StorageError::record)?;
            if record.key.starts_with(path::LOCK_PREFIX) {
                continue;
            }
            entries.push(Entry {
                path: record.path,
                key: record.key,
                value: record.value,
                secure: record.metadata.secure,
            });
        }
        Ok(entries)
    }

    /// Deletes the leaf record for `key`, its own directory marker, and
    /// every descendant record, as one batched delete set.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = key.trim().trim_matches('/').to_string();
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }

        let mut requests = vec![
            WriteRequest::Delete {
                partition: path::path_without_key(&key),
                sort: path::base_key(&key),
            },
            WriteRequest::Delete {
                partition: path::path_without_key(&key),
                sort: format!("{}/", path::base_key(&key)),
            },
        ];

        // Walk the subtree through marker records.
        let mut pending = vec![key];
        while let Some(prefix) = pending.pop() {
            for entry in self.list(&prefix).await? {
                requests.push(WriteRequest::Delete {
                    partition: entry.path.clone(),
                    sort: entry.key.clone(),
                });
                if let Some(child) = entry.key.strip_suffix('/') {
                    pending.push(path::concat(&entry.path, child));
                }
            }
        }

        // The backend rejects duplicate coordinates within one batch.
        let mut seen = HashSet::new();
        requests.retain(|request| {
            let (partition, sort) = request.coordinates();
            seen.insert((partition.to_string(), sort.to_string()))
        });

        self.batcher
            .write(&self.config.entries_table, requests)
            .await
            .map_err(|failure| failure.error)
    }

    /// Mutation history for the full namespaced key, newest first.
    pub async fn tracking(&self, key: &str) -> Result<Vec<TrackingRecord>, StorageError> {
        let key = key.trim().trim_matches('/');
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        let items = self
            .backend
            .query(&self.config.tracking_table, key, ScanOrder::Descending)
            .await?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let record: TrackingRecord =
                serde_json::from_value(item.body).map_err(StorageError::record)?;
            if path::base_key(&record.key).starts_with(path::LOCK_PREFIX) {
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    fn tracking_item(
        &self,
        full_key: &str,
        entry: &Entry,
        metadata: &EntryMetadata,
    ) -> Result<KvItem, StorageError> {
        let record = TrackingRecord {
            key: full_key.to_string(),
            timestamp: metadata.updated_at,
            value: entry.value.clone(),
            metadata: metadata.clone(),
        };
        let body = serde_json::to_value(&record).map_err(StorageError::record)?;
        Ok(KvItem {
            partition: full_key.to_string(),
            sort: unix_sort_key(metadata.updated_at),
            body,
        })
    }
}

/// Fixed-width encoding so lexicographic sort-key order matches
/// numeric timestamp order.
fn unix_sort_key(timestamp: i64) -> String {
    format!("{:020}", timestamp.max(0))
}
