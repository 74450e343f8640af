// src/indexer.rs
//! Indexer cycle: slow bulk refresh of listing metadata into the store.
//! Touches only the metadata fields, so it may overlap a watcher cycle.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};

use crate::feeds::MetadataFeed;
use crate::store::ResourceStore;
use crate::types::FeedError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOutcome {
    pub listed: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub struct Indexer {
    metadata: Arc<dyn MetadataFeed>,
    store: Arc<dyn ResourceStore>,
}

impl Indexer {
    pub fn new(metadata: Arc<dyn MetadataFeed>, store: Arc<dyn ResourceStore>) -> Self {
        Self { metadata, store }
    }

    pub async fn run_cycle(&self) -> Result<IndexOutcome, FeedError> {
        let listings = self.metadata.fetch_all().await?;
        let now = Utc::now();
        let mut out = IndexOutcome {
            listed: listings.len(),
            ..Default::default()
        };

        for l in listings {
            match self.store.upsert_metadata(l.id, l.meta, now).await {
                Ok(()) => out.updated += 1,
                Err(e) => {
                    tracing::warn!(resource = l.id, error = %e, "metadata write failed, record skipped");
                    counter!("store_errors_total").increment(1);
                    out.skipped += 1;
                }
            }
        }

        if let Err(e) = self.store.flush().await {
            tracing::warn!(error = %e, "state flush failed");
            counter!("store_errors_total").increment(1);
        }
        gauge!("index_last_run_ts").set(now.timestamp() as f64);
        counter!("index_cycles_total").increment(1);
        Ok(out)
    }
}
