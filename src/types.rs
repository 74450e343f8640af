// src/types.rs
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier shared by all three feeds for one listing.
pub type ResourceId = u64;

/// Enrichment block the Metadata Feed and the Validation Lookup both speak.
/// Every field is optional on the wire; absence defaults to empty/zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub bookable: bool,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub project_type: String,
}

/// One authoritative record from the Validation Lookup: metadata plus the
/// unit count the lookup itself reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedListing {
    pub id: ResourceId,
    #[serde(default)]
    pub units: u32,
    #[serde(flatten)]
    pub meta: ListingMeta,
}

/// Why a notification fires. `Available` is used when the confirmation came
/// through the metadata fallback rather than the authoritative lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    NewListing,
    Restocked,
    Available,
}

impl AlertReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertReason::NewListing => "new_listing",
            AlertReason::Restocked => "restocked",
            AlertReason::Available => "available",
        }
    }
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter or Metadata Feed failure. Aborts the whole cycle; the store is
/// left untouched and the next timer fire retries.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed payload malformed: {0}")]
    Malformed(String),
}

/// Per-resource Validation Lookup failure. Never aborts a cycle; the
/// verification pipeline degrades to its metadata fallback or rejects.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("resource not known to the validation endpoint")]
    NotFound,
    #[error("lookup failed transiently: {0}")]
    Transient(String),
    #[error("lookup response malformed: {0}")]
    Malformed(String),
}

/// Durable state failure. Callers skip the affected resource for the
/// current cycle only.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state io: {0}")]
    Io(#[from] std::io::Error),
    #[error("state encode: {0}")]
    Encode(#[from] serde_json::Error),
}
