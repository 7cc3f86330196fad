//! # Serve Command
//!
//! Runs the catalog service: seeds the store from an optional fixture,
//! wires the realtime delta path into the count reconciler, starts the
//! periodic batch reconciliation, and serves the HTTP API until Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tokio::sync::mpsc;

use souq_api::AppState;
use souq_search::{ActiveProductFilter, CategoryCountReconciler, RealtimeCatalog};
use souq_store::DocumentStore;

use crate::fixture::CatalogFixture;

/// Arguments for `souq serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1:8080", env = "SOUQ_BIND")]
    pub bind: SocketAddr,

    /// Catalog fixture to seed the store with at startup.
    #[arg(long, env = "SOUQ_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Seconds between authoritative batch count reconciliations.
    #[arg(long, default_value_t = 300, env = "SOUQ_SYNC_INTERVAL")]
    pub sync_interval: u64,
}

/// Run the service until interrupted.
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let store = DocumentStore::new();
    if let Some(path) = &args.catalog {
        CatalogFixture::load(path)?.load_into(&store).await?;
    }

    // Incremental path: stream per-category deltas from the active slice
    // into the reconciler. The subscription handle must stay alive for the
    // lifetime of the server.
    let (delta_tx, delta_rx) = mpsc::unbounded_channel();
    let catalog = RealtimeCatalog::new(store.clone());
    let _delta_sub = catalog.subscribe_with_deltas(
        ActiveProductFilter::default(),
        delta_tx,
        |err| tracing::warn!(error = %err, "catalog subscription terminated"),
    );
    let delta_reconciler = CategoryCountReconciler::new(store.clone());
    tokio::spawn(async move { delta_reconciler.consume_deltas(delta_rx).await });

    // Batch path: periodic authoritative recomputation corrects any drift
    // the incremental path accumulates.
    let periodic = CategoryCountReconciler::new(store.clone());
    let every = Duration::from_secs(args.sync_interval);
    tokio::spawn(async move { periodic.run_periodic(every).await });

    let app = souq_api::app(AppState::new(store.clone()));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    tracing::info!(addr = %args.bind, "serving catalog API");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    // Tear down subscriptions so their error callbacks fire before exit.
    store.close();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
    }
    tracing::info!("shutdown requested");
}
