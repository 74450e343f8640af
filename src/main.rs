//! Listing Watcher — Binary Entrypoint
//! Boots the feed watchers, the indexer, and the Axum status/metrics
//! surface, then serves until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics::counter;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use listing_watcher::api::{self, AppState};
use listing_watcher::config::Settings;
use listing_watcher::feeds::{HttpCounterFeed, HttpMetadataFeed, HttpValidationLookup};
use listing_watcher::indexer::Indexer;
use listing_watcher::metrics::Metrics;
use listing_watcher::notify::NotifierMux;
use listing_watcher::scheduler::{self, CycleCfg};
use listing_watcher::store::{FileStore, ResourceStore};
use listing_watcher::watcher::{Watcher, WatcherCfg};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_watcher=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env()?;
    tracing::info!(
        watch_interval = settings.watch_interval_secs,
        index_interval = settings.index_interval_secs,
        state = %settings.state_path.display(),
        "starting listing watcher"
    );

    let metrics = Metrics::init();

    let store: Arc<dyn ResourceStore> = Arc::new(FileStore::load(&settings.state_path).await);
    let counter_feed = Arc::new(HttpCounterFeed::new(settings.counter_feed_url.clone()));
    let metadata_feed = Arc::new(HttpMetadataFeed::new(settings.metadata_feed_url.clone()));
    let lookup = Arc::new(HttpValidationLookup::new(settings.validation_url.clone()));
    let notifier = Arc::new(NotifierMux::from_env());

    let watcher = Arc::new(Watcher::new(
        counter_feed,
        metadata_feed.clone(),
        lookup,
        store.clone(),
        notifier,
        WatcherCfg {
            verify_concurrency: settings.verify_concurrency,
            allowed_project_types: settings.allowed_project_types.clone(),
        },
    ));
    let indexer = Arc::new(Indexer::new(metadata_feed, store.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let w = watcher.clone();
    let h_watch = scheduler::spawn_cycle(
        "watch",
        CycleCfg {
            interval_secs: settings.watch_interval_secs,
        },
        shutdown_rx.clone(),
        move || {
            let w = w.clone();
            async move {
                match w.run_cycle().await {
                    Ok(o) => tracing::info!(
                        target: "watch",
                        resources = o.resources,
                        transitions = o.transitions,
                        confirmed = o.confirmed,
                        rejected = o.rejected,
                        dispatched = o.dispatched,
                        baseline = o.baseline,
                        "watch cycle complete"
                    ),
                    Err(e) => {
                        tracing::warn!(target: "watch", error = %e, "watch cycle aborted");
                        counter!("watch_cycle_errors_total").increment(1);
                    }
                }
            }
        },
    );

    let ix = indexer.clone();
    let h_index = scheduler::spawn_cycle(
        "index",
        CycleCfg {
            interval_secs: settings.index_interval_secs,
        },
        shutdown_rx,
        move || {
            let ix = ix.clone();
            async move {
                match ix.run_cycle().await {
                    Ok(o) => tracing::info!(
                        target: "index",
                        listed = o.listed,
                        updated = o.updated,
                        skipped = o.skipped,
                        "index cycle complete"
                    ),
                    Err(e) => {
                        tracing::warn!(target: "index", error = %e, "index cycle aborted");
                        counter!("index_cycle_errors_total").increment(1);
                    }
                }
            }
        },
    );

    let app = api::create_router(AppState {
        store: store.clone(),
        started_at: chrono::Utc::now(),
    })
    .merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the timers and let in-flight cycles reach their commit point.
    let _ = shutdown_tx.send(true);
    let _ = h_watch.await;
    let _ = h_index.await;

    if let Err(e) = store.flush().await {
        tracing::warn!(error = %e, "final state flush failed");
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested");
}
