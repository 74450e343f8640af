// src/feeds/validation.rs
use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::types::{LookupError, ResourceId, ValidatedListing};

use super::ValidationLookup;

/// HTTP adapter for the authoritative per-resource endpoint:
/// `GET {base_url}/{id}` returning one `ValidatedListing` document.
pub struct HttpValidationLookup {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpValidationLookup {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: Client::new(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl ValidationLookup for HttpValidationLookup {
    async fn lookup(&self, id: ResourceId) -> Result<ValidatedListing, LookupError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), id);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LookupError::Transient(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| LookupError::Transient(e.to_string()))?;
        let body = resp
            .text()
            .await
            .map_err(|e| LookupError::Transient(e.to_string()))?;

        serde_json::from_str(body.trim()).map_err(|e| LookupError::Malformed(e.to_string()))
    }
}
