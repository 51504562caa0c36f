use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::processor::Processor;
use super::store::{BoxError, BoxStore};
use crate::storage::path;
use crate::storage::EntryStore;

/// Renders a stored template into a fully substituted artifact by
/// resolving its placeholders against the entry namespace.
pub struct BoxBuilder {
    boxes: Arc<BoxStore>,
    entries: Arc<EntryStore>,
}

impl BoxBuilder {
    pub fn new(boxes: Arc<BoxStore>, entries: Arc<EntryStore>) -> Self {
        Self { boxes, entries }
    }

    /// Fetches the template, substitutes the fixed `:service`,
    /// `:stage`, `:template` markers and any caller-supplied `:arg`
    /// markers, then resolves `{{ ... }}` variables per owning prefix.
    pub async fn build(
        &self,
        service: &str,
        stage: &str,
        template: &str,
        args: &HashMap<String, String>,
    ) -> Result<String, BoxError> {
        let raw = self.boxes.retrieve(service, stage, template).await?;
        let mut body = String::from_utf8_lossy(&raw).into_owned();

        body = body
            .replace(":service", service)
            .replace(":stage", stage)
            .replace(":template", template);
        for (name, value) in args {
            body = body.replace(&format!(":{name}"), value);
        }

        let processor = Processor::new(body);
        let mut tree: HashMap<String, String> = HashMap::new();

        for prefix in processor.prefixes() {
            let entries = match self.entries.list(&prefix).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(prefix = %prefix, %err, "prefix lookup failed during build");
                    continue;
                }
            };
            let escaped = path::escape_empty_path(&prefix);
            for entry in entries {
                if entry.value.is_empty() {
                    continue;
                }
                // Guards against deeper descendants bleeding into a
                // coarser prefix scan.
                if entry.path != escaped {
                    continue;
                }
                tree.insert(path::concat(&entry.path, &entry.key), entry.value);
            }
        }

        Ok(processor.replace(&tree))
    }
}
