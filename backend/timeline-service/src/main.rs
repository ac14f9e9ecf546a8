use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use timeline_service::consumers::{Dispatcher, FirehoseConsumer};
use timeline_service::db::migrations;
use timeline_service::services::{PostService, ProfileService};
use timeline_service::storage::memory::MemoryStorage;
use timeline_service::storage::Storage;
use timeline_service::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()
        .map_err(anyhow::Error::msg)
        .context("failed to load configuration")?;
    info!(env = %config.app.env, keyspace = %config.storage.keyspace, "starting timeline service");

    // In-process store for local development; a cluster-backed session
    // plugs in behind the same trait.
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

    migrations::run_migrations(storage.as_ref())
        .await
        .context("failed to run migrations")?;

    let posts = PostService::new(storage.clone());
    let profiles = ProfileService::new(storage.clone());
    let dispatcher = Dispatcher::new(posts, profiles);

    let consumer = FirehoseConsumer::new(&config.kafka, dispatcher)
        .context("failed to create firehose consumer")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_task = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    shutdown_signal().await;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(Duration::from_secs(15), consumer_task).await {
        Ok(Ok(Ok(()))) => info!("firehose consumer exited cleanly"),
        Ok(Ok(Err(err))) => error!(%err, "firehose consumer exited with error"),
        Ok(Err(err)) => error!(%err, "firehose consumer task panicked"),
        Err(_) => warn!("firehose consumer did not stop in time"),
    }

    info!("timeline service stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            error!(%err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
