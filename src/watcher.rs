// src/watcher.rs
//! One Watcher cycle: counter feed -> trigger detector -> verification
//! pipeline -> store update -> dispatch.
//!
//! Error recovery happens at the boundary of the unit that caused it: a
//! feed failure aborts the whole cycle with the store untouched, a store
//! failure skips that one resource, a dispatch failure is logged and the
//! transition still counts as acted upon.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};

use crate::feeds::{self, CounterFeed, MetadataFeed, ValidationLookup};
use crate::notify::{AlertEvent, Notifier};
use crate::store::ResourceStore;
use crate::trigger::{self, TransitionEvent, TransitionKind};
use crate::types::FeedError;
use crate::verify::{self, Verdict};

#[derive(Debug, Clone)]
pub struct WatcherCfg {
    /// Cap on concurrent validation lookups within one cycle.
    pub verify_concurrency: usize,
    /// Allowed project types; empty admits everything.
    pub allowed_project_types: Vec<String>,
}

impl Default for WatcherCfg {
    fn default() -> Self {
        Self {
            verify_concurrency: 4,
            allowed_project_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// True when this run only recorded baselines (cold store).
    pub baseline: bool,
    pub resources: usize,
    pub transitions: usize,
    pub filtered: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub dispatched: usize,
    pub dispatch_errors: usize,
    pub store_skips: usize,
}

pub struct Watcher {
    counter: Arc<dyn CounterFeed>,
    metadata: Arc<dyn MetadataFeed>,
    lookup: Arc<dyn ValidationLookup>,
    store: Arc<dyn ResourceStore>,
    notifier: Arc<dyn Notifier>,
    cfg: WatcherCfg,
}

impl Watcher {
    pub fn new(
        counter: Arc<dyn CounterFeed>,
        metadata: Arc<dyn MetadataFeed>,
        lookup: Arc<dyn ValidationLookup>,
        store: Arc<dyn ResourceStore>,
        notifier: Arc<dyn Notifier>,
        cfg: WatcherCfg,
    ) -> Self {
        Self {
            counter,
            metadata,
            lookup,
            store,
            notifier,
            cfg,
        }
    }

    /// Run one full cycle. `Err` means a feed fetch failed and nothing was
    /// written; the next timer fire retries.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, FeedError> {
        let counts = self.counter.fetch_counts().await?;
        let listings = self.metadata.fetch_all().await?;
        let snapshot = Arc::new(feeds::snapshot_table(listings));

        let now = Utc::now();
        let mut out = CycleOutcome {
            resources: counts.len(),
            ..Default::default()
        };

        // First completed pass records baselines only; the whole universe
        // of resources is unseen and must not read as "just became
        // available".
        if !self.store.is_primed().await {
            for (&id, &count) in &counts {
                if let Err(e) = self.store.upsert_count(id, count, now).await {
                    tracing::warn!(resource = id, error = %e, "baseline write failed, resource skipped");
                    counter!("store_errors_total").increment(1);
                    out.store_skips += 1;
                }
            }
            if let Err(e) = self.store.mark_primed().await {
                tracing::warn!(error = %e, "failed to mark store primed");
            }
            self.finish_cycle(&mut out, now).await;
            out.baseline = true;
            tracing::info!(resources = out.resources, "baseline pass recorded, no detection");
            return Ok(out);
        }

        let mut transitions = Vec::new();
        let mut steady = Vec::new();
        for (&id, &count) in &counts {
            let prev = self.store.get(id).await.and_then(|r| r.available_count);
            match trigger::classify(prev, count) {
                TransitionKind::Transition => transitions.push(TransitionEvent {
                    resource_id: id,
                    previous_count: prev,
                    new_count: count,
                }),
                TransitionKind::NoChange => steady.push((id, count)),
            }
        }
        out.transitions = transitions.len();
        counter!("transitions_detected_total").increment(transitions.len() as u64);

        // Configured predicate, applied before the pipeline. Filtered
        // transitions still get their counts persisted below so they stay
        // on the same plateau and cannot re-fire.
        let (kept, filtered): (Vec<_>, Vec<_>) = transitions.into_iter().partition(|ev| {
            verify::type_allowed(
                snapshot.get(&ev.resource_id),
                &self.cfg.allowed_project_types,
            )
        });
        out.filtered = filtered.len();
        counter!("transitions_filtered_total").increment(filtered.len() as u64);
        for ev in &filtered {
            steady.push((ev.resource_id, ev.new_count));
        }

        // Counts are replaced every cycle regardless of verdict.
        for (id, count) in steady {
            if let Err(e) = self.store.upsert_count(id, count, now).await {
                tracing::warn!(resource = id, error = %e, "count write failed, resource skipped");
                counter!("store_errors_total").increment(1);
                out.store_skips += 1;
            }
        }

        let verdicts = verify::verify_transitions(
            kept,
            snapshot,
            self.lookup.clone(),
            self.cfg.verify_concurrency,
        )
        .await;

        for (event, verdict) in verdicts {
            // Persist-count precedes dispatch: even a failed send leaves
            // the transition acted upon, so the next cycle stays quiet.
            if let Err(e) = self
                .store
                .upsert_count(event.resource_id, event.new_count, now)
                .await
            {
                tracing::warn!(resource = event.resource_id, error = %e, "count write failed, resource skipped");
                counter!("store_errors_total").increment(1);
                out.store_skips += 1;
                continue;
            }

            match verdict {
                Verdict::Confirmed { listing, reason } => {
                    out.confirmed += 1;
                    counter!("verify_confirmed_total").increment(1);
                    if let Err(e) = self
                        .store
                        .upsert_metadata(listing.id, listing.meta.clone(), now)
                        .await
                    {
                        tracing::warn!(resource = listing.id, error = %e, "enrichment write failed");
                        counter!("store_errors_total").increment(1);
                    }
                    let alert = AlertEvent {
                        listing,
                        reason,
                        ts: now,
                    };
                    match self.notifier.send(&alert).await {
                        Ok(()) => {
                            out.dispatched += 1;
                            counter!("alerts_dispatched_total").increment(1);
                        }
                        Err(e) => {
                            out.dispatch_errors += 1;
                            counter!("alert_dispatch_errors_total").increment(1);
                            tracing::warn!(resource = alert.listing.id, error = ?e, "dispatch failed, not retried this cycle");
                        }
                    }
                }
                Verdict::Rejected { reason } => {
                    out.rejected += 1;
                    counter!("verify_rejected_total").increment(1);
                    tracing::debug!(resource = event.resource_id, ?reason, "transition refuted");
                }
            }
        }

        self.finish_cycle(&mut out, now).await;
        Ok(out)
    }

    async fn finish_cycle(&self, out: &mut CycleOutcome, now: chrono::DateTime<Utc>) {
        if let Err(e) = self.store.flush().await {
            tracing::warn!(error = %e, "state flush failed");
            counter!("store_errors_total").increment(1);
            out.store_skips += 1;
        }
        let stats = self.store.stats().await;
        gauge!("store_resources").set(stats.resources as f64);
        gauge!("watch_last_run_ts").set(now.timestamp() as f64);
        counter!("watch_cycles_total").increment(1);
    }
}
