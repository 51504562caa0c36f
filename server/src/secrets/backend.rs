use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SecretError {
    #[error("secret backend: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretVersion {
    /// 1 on the first write of a name, incrementing on overwrite.
    pub version: i64,
}

/// External secret backend: single-item writes, overwrite semantics,
/// resource tagging.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn put_secret(
        &self,
        name: &str,
        value: &str,
        tier: &str,
        key_id: Option<&str>,
    ) -> Result<SecretVersion, SecretError>;

    async fn tag_resource(&self, name: &str) -> Result<(), SecretError>;
}

/// In-process secret backend for local mode and tests. Keeps every
/// written version so tests can assert on history.
#[derive(Default)]
pub struct MemorySecrets {
    values: RwLock<HashMap<String, Vec<String>>>,
    tags: RwLock<HashMap<String, Vec<(String, String)>>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_value(&self, name: &str) -> Option<String> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(name).and_then(|v| v.last().cloned()))
    }

    pub fn version_count(&self, name: &str) -> usize {
        self.values
            .read()
            .map(|values| values.get(name).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn tags_for(&self, name: &str) -> Vec<(String, String)> {
        self.tags
            .read()
            .map(|tags| tags.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SecretBackend for MemorySecrets {
    async fn put_secret(
        &self,
        name: &str,
        value: &str,
        _tier: &str,
        _key_id: Option<&str>,
    ) -> Result<SecretVersion, SecretError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| SecretError::Backend(e.to_string()))?;
        let versions = values.entry(name.to_string()).or_default();
        versions.push(value.to_string());
        Ok(SecretVersion {
            version: versions.len() as i64,
        })
    }

    async fn tag_resource(&self, name: &str) -> Result<(), SecretError> {
        let mut tags = self
            .tags
            .write()
            .map_err(|e| SecretError::Backend(e.to_string()))?;
        tags.entry(name.to_string())
            .or_default()
            .push(("project".to_string(), "nbox".to_string()));
        Ok(())
    }
}
