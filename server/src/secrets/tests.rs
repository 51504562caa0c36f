#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared_types::Entry;

use super::{MemorySecrets, SecretBackend, SecretError, SecretStore, SecretVersion};
use crate::config::Config;

fn test_store() -> (Arc<MemorySecrets>, SecretStore) {
    let backend = Arc::new(MemorySecrets::new());
    let store = SecretStore::new(backend.clone(), Arc::new(Config::default()));
    (backend, store)
}

#[tokio::test]
async fn upsert_fans_out_and_reports_per_key() {
    let (backend, store) = test_store();

    let report = store
        .upsert(&[
            Entry::new("ns/first", "shh-1", true),
            Entry::new("ns/second", "shh-2", true),
        ])
        .await;

    assert_eq!(report.len(), 2);
    assert_eq!(report.get("ns/first"), Some(&None));
    assert_eq!(report.get("ns/second"), Some(&None));
    assert_eq!(backend.current_value("/ns/first").unwrap(), "shh-1");
    assert_eq!(backend.current_value("/ns/second").unwrap(), "shh-2");
}

#[tokio::test]
async fn first_version_gets_the_ownership_tag() {
    let (backend, store) = test_store();

    store.upsert(&[Entry::new("ns/key", "v1", true)]).await;
    store.upsert(&[Entry::new("ns/key", "v2", true)]).await;

    // Tagging runs on a spawned task; let it settle.
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(1)).await;
        if !backend.tags_for("/ns/key").is_empty() {
            break;
        }
    }

    assert_eq!(backend.version_count("/ns/key"), 2);
    // Tagged exactly once, on version 1.
    assert_eq!(
        backend.tags_for("/ns/key"),
        vec![("project".to_string(), "nbox".to_string())]
    );
}

#[tokio::test]
async fn failures_are_collected_not_propagated() {
    struct FailingSecrets;

    #[async_trait]
    impl SecretBackend for FailingSecrets {
        async fn put_secret(
            &self,
            name: &str,
            _value: &str,
            _tier: &str,
            _key_id: Option<&str>,
        ) -> Result<SecretVersion, SecretError> {
            if name.contains("broken") {
                Err(SecretError::Backend("denied".to_string()))
            } else {
                Ok(SecretVersion { version: 2 })
            }
        }

        async fn tag_resource(&self, _name: &str) -> Result<(), SecretError> {
            Ok(())
        }
    }

    let store = SecretStore::new(Arc::new(FailingSecrets), Arc::new(Config::default()));
    let report = store
        .upsert(&[
            Entry::new("ns/ok", "v", true),
            Entry::new("ns/broken", "v", true),
        ])
        .await;

    assert_eq!(report.get("ns/ok"), Some(&None));
    assert!(report.get("ns/broken").unwrap().as_ref().unwrap().contains("denied"));
}

#[test]
fn locator_embeds_region_account_and_key() {
    let config = Config {
        region: "us-east-1".to_string(),
        account_id: "123456789012".to_string(),
        ..Config::default()
    };
    let store = SecretStore::new(Arc::new(MemorySecrets::new()), Arc::new(config));

    assert_eq!(
        store.locator("team/service/secret"),
        "arn:aws:ssm:us-east-1:123456789012:parameter/team/service/secret"
    );
    assert_eq!(
        store.locator("/team/x"),
        "arn:aws:ssm:us-east-1:123456789012:parameter/team/x"
    );
}
