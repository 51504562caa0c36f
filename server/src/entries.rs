//! Entry use-case: secure-value indirection in front of the storage
//! engine.

use std::collections::HashMap;
use std::sync::Arc;

use shared_types::{Entry, TrackingRecord};

use crate::secrets::SecretStore;
use crate::storage::{EntryStore, StorageError, UpsertReport};

pub struct EntryService {
    store: Arc<EntryStore>,
    secrets: Arc<SecretStore>,
}

impl EntryService {
    pub fn new(store: Arc<EntryStore>, secrets: Arc<SecretStore>) -> Self {
        Self { store, secrets }
    }

    /// Upserts a batch of entries on behalf of `actor`.
    ///
    /// Secure entries go to the secret backend first; only on success
    /// does a locator reference take the value's place in the main
    /// store. A secure entry whose secret write failed is dropped from
    /// the store batch entirely and its error reported unchanged, so
    /// the plaintext never lands anywhere else. The secret name and
    /// the locator both derive from the sanitized key, the same key
    /// the main store persists under.
    pub async fn upsert(&self, entries: Vec<Entry>, actor: &str) -> UpsertReport {
        let mut report: UpsertReport =
            entries.iter().map(|e| (e.key.clone(), None)).collect();

        let secure: Vec<Entry> = entries
            .iter()
            .filter(|e| e.secure)
            .filter_map(|e| {
                let key = self.store.sanitize_key(&e.key);
                (!key.is_empty()).then(|| {
                    let mut entry = e.clone();
                    entry.key = key;
                    entry
                })
            })
            .collect();
        let secret_report: HashMap<String, Option<String>> = if secure.is_empty() {
            HashMap::new()
        } else {
            self.secrets.upsert(&secure).await
        };

        let mut to_store = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if entry.secure {
                let stored_key = self.store.sanitize_key(&entry.key);
                if let Some(Some(error)) = secret_report.get(&stored_key) {
                    report.insert(entry.key.clone(), Some(error.clone()));
                    continue;
                }
                if !stored_key.is_empty() {
                    entry.value = self.secrets.locator(&stored_key);
                }
            }
            to_store.push(entry);
        }

        for (key, error) in self.store.upsert(&to_store, actor).await {
            if error.is_some() {
                report.insert(key, error);
            }
        }
        report
    }

    pub async fn retrieve(&self, key: &str) -> Result<Option<Entry>, StorageError> {
        self.store.retrieve(key).await
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<Entry>, StorageError> {
        self.store.list(prefix).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.store.delete(key).await
    }

    pub async fn tracking(&self, key: &str) -> Result<Vec<TrackingRecord>, StorageError> {
        self.store.tracking(key).await
    }
}
