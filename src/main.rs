mod config;
mod greeter;
mod handler;
mod http;
mod logger;
mod pack;
mod server;
mod store;

use std::sync::Arc;

use crate::config::{AppState, Config, StorageKind};
use crate::greeter::GreeterNamespace;
use crate::store::fs::FsStore;
use crate::store::memory::MemoryStore;
use crate::store::ObjectStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sizing worker threads from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;
    let store = build_store(&cfg)?;
    let state = Arc::new(AppState::new(cfg, store, GreeterNamespace::hello()));

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    logger::log_server_start(&addr, &state.config);

    // Connections are served on local tasks, so run inside a LocalSet
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(listener, state, signals))
        .await;

    Ok(())
}

/// Construct the configured store backend.
fn build_store(cfg: &Config) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
    let store: Arc<dyn ObjectStore> = match cfg.storage.backend {
        StorageKind::Fs => Arc::new(FsStore::new(&cfg.storage.root)?),
        StorageKind::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
