//! Abstract sorted-key-value backend contract and the in-memory
//! implementation used for local mode and tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use thiserror::Error;

/// Per-call item limit most managed table stores impose on batched writes.
pub const DEFAULT_BATCH_LIMIT: usize = 25;

#[derive(Debug, Clone, Error)]
pub enum KvError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("malformed request: {0}")]
    Malformed(String),
}

/// One stored item: partition + sort coordinates and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct KvItem {
    pub partition: String,
    pub sort: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(KvItem),
    Delete { partition: String, sort: String },
}

impl WriteRequest {
    pub fn coordinates(&self) -> (&str, &str) {
        match self {
            WriteRequest::Put(item) => (&item.partition, &item.sort),
            WriteRequest::Delete { partition, sort } => (partition, sort),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Ascending,
    Descending,
}

/// Capability contract for the table store. Batched writes may report an
/// "unprocessed" subset; callers own retrying it. Point reads are
/// strongly consistent where the backend offers the option.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Writes up to `batch_limit` requests, returning the subset the
    /// backend did not process.
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, KvError>;

    async fn get_item(
        &self,
        table: &str,
        partition: &str,
        sort: &str,
    ) -> Result<Option<KvItem>, KvError>;

    /// All items whose partition key equals `partition`, ordered by sort
    /// key. Pagination is internal to the implementation.
    async fn query(
        &self,
        table: &str,
        partition: &str,
        order: ScanOrder,
    ) -> Result<Vec<KvItem>, KvError>;

    /// Full table scan; used only for the box index.
    async fn scan(&self, table: &str) -> Result<Vec<KvItem>, KvError>;

    /// Backend-imposed item limit per `batch_write` call.
    fn batch_limit(&self) -> usize {
        DEFAULT_BATCH_LIMIT
    }
}

type Table = BTreeMap<(String, String), Value>;

/// Sorted in-process backend. Mirrors the managed store's contract,
/// including the refusal of empty partition or sort values and the
/// per-call batch limit.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently stored in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

fn validate(partition: &str, sort: &str) -> Result<(), KvError> {
    if partition.is_empty() || sort.is_empty() {
        return Err(KvError::Malformed(
            "empty partition or sort value".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, KvError> {
        if requests.len() > self.batch_limit() {
            return Err(KvError::Malformed(format!(
                "batch of {} exceeds limit {}",
                requests.len(),
                self.batch_limit()
            )));
        }
        let mut tables = self
            .tables
            .write()
            .map_err(|e| KvError::Unavailable(e.to_string()))?;
        let entries = tables.entry(table.to_string()).or_default();
        for request in requests {
            let (partition, sort) = request.coordinates();
            validate(partition, sort)?;
            match request {
                WriteRequest::Put(item) => {
                    entries.insert((item.partition, item.sort), item.body);
                }
                WriteRequest::Delete { partition, sort } => {
                    entries.remove(&(partition, sort));
                }
            }
        }
        Ok(Vec::new())
    }

    async fn get_item(
        &self,
        table: &str,
        partition: &str,
        sort: &str,
    ) -> Result<Option<KvItem>, KvError> {
        validate(partition, sort)?;
        let tables = self
            .tables
            .read()
            .map_err(|e| KvError::Unavailable(e.to_string()))?;
        Ok(tables.get(table).and_then(|entries| {
            entries
                .get(&(partition.to_string(), sort.to_string()))
                .map(|body| KvItem {
                    partition: partition.to_string(),
                    sort: sort.to_string(),
                    body: body.clone(),
                })
        }))
    }

    async fn query(
        &self,
        table: &str,
        partition: &str,
        order: ScanOrder,
    ) -> Result<Vec<KvItem>, KvError> {
        if partition.is_empty() {
            return Err(KvError::Malformed("empty partition value".to_string()));
        }
        let tables = self
            .tables
            .read()
            .map_err(|e| KvError::Unavailable(e.to_string()))?;
        let mut items: Vec<KvItem> = tables
            .get(table)
            .map(|entries| {
                entries
                    .range(
                        (partition.to_string(), String::new())
                            ..(format!("{partition}\u{10ffff}"), String::new()),
                    )
                    .filter(|((p, _), _)| p == partition)
                    .map(|((p, s), body)| KvItem {
                        partition: p.clone(),
                        sort: s.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        if order == ScanOrder::Descending {
            items.reverse();
        }
        Ok(items)
    }

    async fn scan(&self, table: &str) -> Result<Vec<KvItem>, KvError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| KvError::Unavailable(e.to_string()))?;
        Ok(tables
            .get(table)
            .map(|entries| {
                entries
                    .iter()
                    .map(|((p, s), body)| KvItem {
                        partition: p.clone(),
                        sort: s.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put(partition: &str, sort: &str, body: Value) -> WriteRequest {
        WriteRequest::Put(KvItem {
            partition: partition.to_string(),
            sort: sort.to_string(),
            body,
        })
    }

    #[tokio::test]
    async fn write_get_query_round_trip() {
        let backend = MemoryBackend::new();
        backend
            .batch_write(
                "t",
                vec![
                    put("a", "x", json!(1)),
                    put("a", "y", json!(2)),
                    put("b", "z", json!(3)),
                ],
            )
            .await
            .unwrap();

        let item = backend.get_item("t", "a", "y").await.unwrap().unwrap();
        assert_eq!(item.body, json!(2));
        assert!(backend.get_item("t", "a", "z").await.unwrap().is_none());

        let items = backend.query("t", "a", ScanOrder::Ascending).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].sort, "x");

        let items = backend
            .query("t", "a", ScanOrder::Descending)
            .await
            .unwrap();
        assert_eq!(items[0].sort, "y");
    }

    #[tokio::test]
    async fn rejects_oversized_batches_and_empty_coordinates() {
        let backend = MemoryBackend::new();
        let oversized: Vec<WriteRequest> = (0..=DEFAULT_BATCH_LIMIT)
            .map(|i| put("p", &format!("k{i}"), json!(i)))
            .collect();
        assert!(backend.batch_write("t", oversized).await.is_err());
        assert!(backend
            .batch_write("t", vec![put("", "k", json!(0))])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_removes_items() {
        let backend = MemoryBackend::new();
        backend
            .batch_write("t", vec![put("a", "x", json!(1))])
            .await
            .unwrap();
        backend
            .batch_write(
                "t",
                vec![WriteRequest::Delete {
                    partition: "a".to_string(),
                    sort: "x".to_string(),
                }],
            )
            .await
            .unwrap();
        assert!(backend.get_item("t", "a", "x").await.unwrap().is_none());
        assert!(backend.is_empty("t"));
    }
}
