use anyhow::Result;
use object_store::local::LocalFileSystem;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, Level};

use server::boxes::{BoxBuilder, BoxStore};
use server::config::Config;
use server::entries::EntryService;
use server::http::{start_server, AppState, Authenticator, Health};
use server::secrets::{MemorySecrets, SecretStore};
use server::storage::kv::MemoryBackend;
use server::storage::{EntryStore, PermitPool, WriteBatcher};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    info!("Starting nbox server");

    let config = Arc::new(Config::from_env());

    // Template blobs live on the local filesystem in this mode.
    std::fs::create_dir_all(&config.template_path)?;
    let blobs = Arc::new(LocalFileSystem::new_with_prefix(&config.template_path)?);
    info!("Using template path: {}", config.template_path.display());

    let backend = Arc::new(MemoryBackend::new());
    let secrets = Arc::new(MemorySecrets::new());

    let batcher = Arc::new(WriteBatcher::new(
        backend.clone(),
        PermitPool::new(config.parallel_operations),
    ));
    let entry_store = Arc::new(EntryStore::new(
        backend.clone(),
        batcher.clone(),
        config.clone(),
    ));
    let secret_store = Arc::new(SecretStore::new(secrets, config.clone()));
    let boxes = Arc::new(BoxStore::new(blobs, backend, batcher, config.clone()));
    let builder = Arc::new(BoxBuilder::new(boxes.clone(), entry_store.clone()));

    let state = Arc::new(AppState {
        entries: Arc::new(EntryService::new(entry_store, secret_store)),
        boxes,
        builder,
        auth: Authenticator::new(&config.auth_realm, &config.auth_credentials),
        health: Health::new("nbox"),
    });

    let addr = std::env::var("BIND_ADDRESS")
        .unwrap_or_else(|_| "0.0.0.0:7337".to_string())
        .parse::<SocketAddr>()?;

    start_server(state, addr).await?;

    Ok(())
}
