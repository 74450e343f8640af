// src/feeds/counter.rs
use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{FeedError, ResourceId};

use super::CounterFeed;

/// Tolerant envelopes: some deployments wrap the mapping in a `counts`
/// object, some return the map bare. Order matters, the wrapped shape is
/// also a valid flat map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CountsAny {
    Wrapped { counts: HashMap<String, Value> },
    Flat(HashMap<String, Value>),
}

/// Normalize a raw counter payload into id -> count. Unparsable counts
/// default to 0; non-numeric ids are dropped with a warning.
pub fn parse_counts(raw: &str) -> Result<HashMap<ResourceId, u32>, FeedError> {
    let any: CountsAny = serde_json::from_str(raw)
        .map_err(|e| FeedError::Malformed(format!("counts payload: {e}")))?;
    let entries = match any {
        CountsAny::Wrapped { counts } => counts,
        CountsAny::Flat(m) => m,
    };
    let mut out = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let Ok(id) = key.trim().parse::<ResourceId>() else {
            tracing::warn!(key = %key, "counter feed: non-numeric resource id dropped");
            continue;
        };
        out.insert(id, coerce_count(&value));
    }
    Ok(out)
}

fn coerce_count(v: &Value) -> u32 {
    match v {
        Value::Number(n) => n
            .as_u64()
            .and_then(|x| u32::try_from(x).ok())
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub struct HttpCounterFeed {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpCounterFeed {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl CounterFeed for HttpCounterFeed {
    async fn fetch_counts(&self) -> Result<HashMap<ResourceId, u32>, FeedError> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let status = resp.status();
        let body = resp.text().await?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Err(FeedError::Malformed(format!(
                "counter feed returned empty/null with status {status}"
            )));
        }
        parse_counts(trimmed)
    }

    fn name(&self) -> &'static str {
        "counter"
    }
}
