use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use shared_types::{BoxSpec, Stage, Template};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::storage::kv::{KeyValueBackend, KvItem, WriteRequest};
use crate::storage::{StorageError, WriteBatcher};

#[derive(Debug, Error)]
pub enum BoxError {
    #[error(transparent)]
    Blob(#[from] object_store::Error),

    #[error("template body is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("template body is not valid JSON: {0}")]
    Body(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("index write: {0}")]
    Index(String),
}

/// Index record mapping (service, stage) to the stored template.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoxRecord {
    service: String,
    stage: String,
    template: Template,
}

/// Template artifacts: bodies in the blob backend, one index record
/// per (service, stage) in the box table.
pub struct BoxStore {
    blobs: Arc<dyn ObjectStore>,
    kv: Arc<dyn KeyValueBackend>,
    batcher: Arc<WriteBatcher>,
    config: Arc<Config>,
}

impl BoxStore {
    pub fn new(
        blobs: Arc<dyn ObjectStore>,
        kv: Arc<dyn KeyValueBackend>,
        batcher: Arc<WriteBatcher>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            blobs,
            kv,
            batcher,
            config,
        }
    }

    fn blob_path(service: &str, stage: &str, template: &str) -> String {
        format!("{service}/{stage}/{template}")
    }

    /// Stores every stage's template body and index record, returning
    /// the blob paths that were persisted. A failing stage is logged
    /// and skipped, the rest still go through.
    pub async fn upsert_box(&self, spec: &BoxSpec) -> Vec<String> {
        let mut stored = Vec::new();
        for (stage_name, stage) in &spec.stage {
            let path = Self::blob_path(&spec.service, stage_name, &stage.template.name);
            match self
                .store_stage(&spec.service, stage_name, &stage.template, &path)
                .await
            {
                Ok(()) => {
                    info!(path = %path, "stored box template");
                    stored.push(path);
                }
                Err(err) => {
                    warn!(service = %spec.service, stage = %stage_name, %err, "box upsert failed");
                }
            }
        }
        stored
    }

    async fn store_stage(
        &self,
        service: &str,
        stage: &str,
        template: &Template,
        path: &str,
    ) -> Result<(), BoxError> {
        let decoded = base64::engine::general_purpose::STANDARD.decode(&template.value)?;
        let body: serde_json::Value = serde_json::from_slice(&decoded)?;
        let pretty = serde_json::to_vec_pretty(&body)?;

        self.blobs
            .put(&Path::from(path), PutPayload::from(pretty))
            .await?;

        let record = BoxRecord {
            service: service.to_string(),
            stage: stage.to_string(),
            template: Template {
                name: path.to_string(),
                // The original template name survives only here.
                value: template.name.clone(),
            },
        };
        let item = KvItem {
            partition: service.to_string(),
            sort: stage.to_string(),
            body: serde_json::to_value(&record)?,
        };
        self.batcher
            .write(&self.config.box_table, vec![WriteRequest::Put(item)])
            .await
            .map_err(|failure| BoxError::Index(failure.error.to_string()))
    }

    pub async fn exists(
        &self,
        service: &str,
        stage: &str,
        template: &str,
    ) -> Result<bool, BoxError> {
        let path = Path::from(Self::blob_path(service, stage, template));
        match self.blobs.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn retrieve(
        &self,
        service: &str,
        stage: &str,
        template: &str,
    ) -> Result<Bytes, BoxError> {
        let path = Path::from(Self::blob_path(service, stage, template));
        let object = self.blobs.get(&path).await?;
        Ok(object.bytes().await?)
    }

    /// All known boxes, grouped by service from the index table.
    pub async fn list(&self) -> Result<Vec<BoxSpec>, BoxError> {
        let items = self.kv.scan(&self.config.box_table).await.map_err(StorageError::from)?;

        let mut boxes: BTreeMap<String, BoxSpec> = BTreeMap::new();
        for item in items {
            let record: BoxRecord = match serde_json::from_value(item.body) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%err, "skipping malformed box index record");
                    continue;
                }
            };
            boxes
                .entry(record.service.clone())
                .or_insert_with(|| BoxSpec {
                    service: record.service.clone(),
                    stage: Default::default(),
                })
                .stage
                .insert(
                    record.stage,
                    Stage {
                        template: record.template,
                    },
                );
        }
        Ok(boxes.into_values().collect())
    }
}
