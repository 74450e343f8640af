// src/verify.rs
//! Verification Pipeline: decides whether a raw transition is genuine
//! before anything is dispatched.
//!
//! The counter feed is fast but occasionally reflects transient or
//! administrative states; the validation lookup is slow but authoritative;
//! the metadata snapshot is a soft fallback so a temporarily unreachable
//! lookup does not eat a real signal.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::feeds::ValidationLookup;
use crate::trigger::TransitionEvent;
use crate::types::{AlertReason, ListingMeta, ResourceId, ValidatedListing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    FalsePositive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Confirmed {
        listing: ValidatedListing,
        reason: AlertReason,
    },
    Rejected {
        reason: RejectReason,
    },
}

/// Project-type predicate, applied before verification. An empty allow
/// list admits everything; a resource missing from the snapshot is kept
/// (its type is unknown, and suppressing on missing metadata would lose
/// genuine signals).
pub fn type_allowed(meta: Option<&ListingMeta>, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match meta {
        None => true,
        Some(m) => allowed.iter().any(|t| t.eq_ignore_ascii_case(&m.project_type)),
    }
}

/// Verify one transition. Stage 1 consults the per-cycle metadata snapshot
/// (absence is not a rejection, metadata lag is expected). Stage 2 asks
/// the authoritative lookup; its explicit answer is final, its failure
/// degrades to the stage-1 record merged with the live count.
pub async fn verify_one(
    event: &TransitionEvent,
    snapshot: &HashMap<ResourceId, ListingMeta>,
    lookup: &dyn ValidationLookup,
) -> Verdict {
    let fallback = snapshot.get(&event.resource_id).cloned();

    match lookup.lookup(event.resource_id).await {
        Ok(v) if v.meta.bookable && v.units > 0 => Verdict::Confirmed {
            listing: v,
            reason: event.reason(),
        },
        Ok(v) => {
            tracing::debug!(
                resource = event.resource_id,
                units = v.units,
                bookable = v.meta.bookable,
                "lookup refuted transition"
            );
            Verdict::Rejected {
                reason: RejectReason::FalsePositive,
            }
        }
        Err(e) => match fallback {
            Some(meta) => {
                tracing::debug!(
                    resource = event.resource_id,
                    error = %e,
                    "lookup unavailable, confirming from metadata snapshot"
                );
                Verdict::Confirmed {
                    listing: ValidatedListing {
                        id: event.resource_id,
                        units: event.new_count,
                        meta,
                    },
                    reason: AlertReason::Available,
                }
            }
            None => {
                tracing::debug!(
                    resource = event.resource_id,
                    error = %e,
                    "lookup unavailable and no metadata fallback"
                );
                Verdict::Rejected {
                    reason: RejectReason::FalsePositive,
                }
            }
        },
    }
}

/// Verify a cycle's transitions with bounded concurrency, respecting the
/// lookup's cost. Completion order is not meaningful.
pub async fn verify_transitions(
    events: Vec<TransitionEvent>,
    snapshot: Arc<HashMap<ResourceId, ListingMeta>>,
    lookup: Arc<dyn ValidationLookup>,
    concurrency: usize,
) -> Vec<(TransitionEvent, Verdict)> {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();
    for event in events {
        let sem = sem.clone();
        let snapshot = snapshot.clone();
        let lookup = lookup.clone();
        set.spawn(async move {
            let _permit = sem.acquire_owned().await.expect("verify semaphore closed");
            let verdict = verify_one(&event, &snapshot, lookup.as_ref()).await;
            (event, verdict)
        });
    }

    let mut out = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => out.push(pair),
            Err(e) => tracing::error!(error = ?e, "verification task panicked"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_admits_everything() {
        assert!(type_allowed(None, &[]));
        let m = ListingMeta {
            project_type: "office".into(),
            ..Default::default()
        };
        assert!(type_allowed(Some(&m), &[]));
    }

    #[test]
    fn allow_list_is_case_insensitive_and_keeps_unknown_types() {
        let allowed = vec!["Apartment".to_string()];
        let apartment = ListingMeta {
            project_type: "apartment".into(),
            ..Default::default()
        };
        let office = ListingMeta {
            project_type: "office".into(),
            ..Default::default()
        };
        assert!(type_allowed(Some(&apartment), &allowed));
        assert!(!type_allowed(Some(&office), &allowed));
        assert!(type_allowed(None, &allowed));
    }
}
