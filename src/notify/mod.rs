// src/notify/mod.rs
//! Alert Dispatcher boundary. The watcher calls the mux at most once per
//! confirmed transition, inside the cycle that confirmed it; a failed send
//! is logged and never retried in-cycle (the stored count already moved,
//! so the next cycle cannot re-fire).

pub mod discord;
pub mod slack;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AlertReason, ValidatedListing};

#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub listing: ValidatedListing,
    pub reason: AlertReason,
    pub ts: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &AlertEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one alert out to every configured sink. With no sinks configured
/// the alert is still logged, which is the whole story in dev.
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn from_env() -> Self {
        let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            if !url.is_empty() {
                sinks.push(Box::new(discord::DiscordNotifier::new(url)));
            }
        }
        if std::env::var("SLACK_WEBHOOK_URL").is_ok() {
            sinks.push(Box::new(slack::SlackNotifier::from_env()));
        }
        if sinks.is_empty() {
            tracing::info!("no notifier configured, alerts will be log-only");
        }
        Self { sinks }
    }

    pub fn with_sinks(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

#[async_trait::async_trait]
impl Notifier for NotifierMux {
    async fn send(&self, ev: &AlertEvent) -> Result<()> {
        tracing::info!(
            resource = ev.listing.id,
            reason = %ev.reason,
            name = %ev.listing.meta.name,
            units = ev.listing.units,
            "availability alert"
        );
        let mut failed = 0usize;
        for sink in &self.sinks {
            if let Err(e) = sink.send(ev).await {
                failed += 1;
                tracing::warn!(sink = sink.name(), error = ?e, "notifier failed");
            }
        }
        if failed > 0 {
            bail!("{failed} of {} notifier(s) failed", self.sinks.len());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for CountingSink {
        async fn send(&self, _ev: &AlertEvent) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("sink down");
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn event() -> AlertEvent {
        AlertEvent {
            listing: ValidatedListing {
                id: 1,
                units: 2,
                meta: Default::default(),
            },
            reason: AlertReason::Restocked,
            ts: Utc::now(),
        }
    }

    #[tokio::test]
    async fn mux_reaches_every_sink_and_reports_failures() {
        let sent = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::with_sinks(vec![
            Box::new(CountingSink {
                sent: sent.clone(),
                fail: false,
            }),
            Box::new(CountingSink {
                sent: sent.clone(),
                fail: true,
            }),
        ]);
        let res = mux.send(&event()).await;
        assert_eq!(sent.load(Ordering::SeqCst), 2);
        assert!(res.is_err());
    }

    #[test]
    fn reason_tag_serializes_snake_case() {
        let json = serde_json::to_string(&AlertReason::NewListing).unwrap();
        assert_eq!(json, "\"new_listing\"");
    }
}
