// src/trigger.rs
//! Trigger Detector: classifies one listing's fresh count against its
//! stored predecessor. Pure; all I/O stays in the watcher cycle.

use crate::types::{AlertReason, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    NoChange,
    Transition,
}

/// Rising-edge rule: alert only on empty/unknown -> positive. Depletion and
/// positive -> positive fluctuations never trigger.
pub fn classify(previous: Option<u32>, new_count: u32) -> TransitionKind {
    match (previous, new_count) {
        (_, 0) => TransitionKind::NoChange,
        (None, _) | (Some(0), _) => TransitionKind::Transition,
        (Some(_), _) => TransitionKind::NoChange,
    }
}

/// Ephemeral: created and consumed inside one watcher cycle, never queued
/// across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub resource_id: ResourceId,
    pub previous_count: Option<u32>,
    pub new_count: u32,
}

impl TransitionEvent {
    /// `new_listing` for a resource the store has never seen, `restocked`
    /// for a known resource coming back from zero.
    pub fn reason(&self) -> AlertReason {
        if self.previous_count.is_none() {
            AlertReason::NewListing
        } else {
            AlertReason::Restocked
        }
    }
}
