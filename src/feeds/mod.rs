// src/feeds/mod.rs
//! Feed adapters: the typed boundary between the core and the three
//! external sources. The core never inspects raw untyped payloads; each
//! adapter normalizes here or fails with a typed error.

pub mod counter;
pub mod metadata;
pub mod validation;

pub use counter::HttpCounterFeed;
pub use metadata::HttpMetadataFeed;
pub use validation::HttpValidationLookup;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{FeedError, ListingMeta, LookupError, ResourceId, ValidatedListing};

/// Fast, sparse source: id -> non-negative count, nothing else.
#[async_trait::async_trait]
pub trait CounterFeed: Send + Sync {
    async fn fetch_counts(&self) -> Result<HashMap<ResourceId, u32>, FeedError>;
    fn name(&self) -> &'static str;
}

/// Slow, rich source: bulk metadata records. Fetched once per cycle.
#[async_trait::async_trait]
pub trait MetadataFeed: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<FeedListing>, FeedError>;
    fn name(&self) -> &'static str;
}

/// Authoritative per-resource endpoint. Callable independently per id; no
/// batching guarantee.
#[async_trait::async_trait]
pub trait ValidationLookup: Send + Sync {
    async fn lookup(&self, id: ResourceId) -> Result<ValidatedListing, LookupError>;
}

/// One Metadata Feed record as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedListing {
    pub id: ResourceId,
    #[serde(flatten)]
    pub meta: ListingMeta,
}

/// One-shot lookup table built once per cycle from a Metadata Feed fetch.
/// Later duplicates win, matching the feed's own ordering.
pub fn snapshot_table(listings: Vec<FeedListing>) -> HashMap<ResourceId, ListingMeta> {
    let mut table = HashMap::with_capacity(listings.len());
    for l in listings {
        table.insert(l.id, l.meta);
    }
    table
}
