// src/feeds/metadata.rs
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::types::FeedError;

use super::{FeedListing, MetadataFeed};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingsAny {
    Wrapped { listings: Vec<FeedListing> },
    Flat(Vec<FeedListing>),
}

pub fn parse_listings(raw: &str) -> Result<Vec<FeedListing>, FeedError> {
    let any: ListingsAny = serde_json::from_str(raw)
        .map_err(|e| FeedError::Malformed(format!("listings payload: {e}")))?;
    Ok(match any {
        ListingsAny::Wrapped { listings } => listings,
        ListingsAny::Flat(v) => v,
    })
}

pub struct HttpMetadataFeed {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpMetadataFeed {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl MetadataFeed for HttpMetadataFeed {
    async fn fetch_all(&self) -> Result<Vec<FeedListing>, FeedError> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;
        parse_listings(body.trim())
    }

    fn name(&self) -> &'static str {
        "metadata"
    }
}
