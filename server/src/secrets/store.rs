use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use shared_types::Entry;
use tracing::warn;

use super::backend::SecretBackend;
use crate::config::Config;

/// Redirects secure values to the external secret backend; the main
/// store only ever sees the locator reference.
pub struct SecretStore {
    backend: Arc<dyn SecretBackend>,
    config: Arc<Config>,
}

impl SecretStore {
    pub fn new(backend: Arc<dyn SecretBackend>, config: Arc<Config>) -> Self {
        Self { backend, config }
    }

    /// Writes every entry's value to the secret backend, one upstream
    /// call per entry, all in flight at once, waiting for all to
    /// finish. The first write of a brand-new secret gets the
    /// ownership tag attached asynchronously; tagging failures are
    /// logged, never surfaced.
    pub async fn upsert(&self, entries: &[Entry]) -> HashMap<String, Option<String>> {
        let writes = entries.iter().map(|entry| async move {
            let name = secret_name(&entry.key);
            let result = self
                .backend
                .put_secret(
                    &name,
                    &entry.value,
                    &self.config.secret_tier,
                    self.config.secret_key_id.as_deref(),
                )
                .await;

            match result {
                Ok(version) => {
                    if version.version == 1 {
                        let backend = self.backend.clone();
                        tokio::spawn(async move {
                            if let Err(err) = backend.tag_resource(&name).await {
                                warn!(parameter = %name, %err, "could not tag secret");
                            }
                        });
                    }
                    (entry.key.clone(), None)
                }
                Err(err) => {
                    warn!(key = %entry.key, %err, "secret upsert failed");
                    (entry.key.clone(), Some(err.to_string()))
                }
            }
        });

        join_all(writes).await.into_iter().collect()
    }

    /// Locator stored in the main table in place of a secure value.
    pub fn locator(&self, key: &str) -> String {
        format!(
            "arn:aws:ssm:{}:{}:parameter/{}",
            self.config.region,
            self.config.account_id,
            key.trim_start_matches('/')
        )
    }
}

/// Secret names are absolute paths in the secret backend.
fn secret_name(key: &str) -> String {
    if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{key}")
    }
}
