//! TransitionNotifier - availability state machine per target
//!
//! ```text
//! Unknown --first probe--> Up | Down      (no event)
//! Up   --down result-->   Down            (downtime)
//! Down --up result-->     Up              (recovery)
//! Up → Up, Down → Down                    (no event)
//! ```
//!
//! The previous state is the cached status the outcome replaced, as
//! reported by the store in the same atomic step that wrote it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{Availability, OwnerId, ProbeOutcome, Target, TargetId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransitionKind {
    Downtime {
        error: Option<String>,
    },
    Recovery {
        status_code: Option<u16>,
        latency_ms: Option<u64>,
    },
}

/// A change of availability that should reach the target's owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    pub owner_id: OwnerId,
    pub target_id: TargetId,
    pub url: String,
    #[serde(flatten)]
    pub kind: TransitionKind,
    pub at: DateTime<Utc>,
}

/// Decide whether moving from `previous` to `outcome` is a transition
pub fn evaluate(previous: Option<Availability>, outcome: &ProbeOutcome) -> Option<TransitionKind> {
    match (previous?, outcome.availability()) {
        (Availability::Up, Availability::Down) => Some(TransitionKind::Downtime {
            error: outcome.error.clone(),
        }),
        (Availability::Down, Availability::Up) => Some(TransitionKind::Recovery {
            status_code: outcome.status_code,
            latency_ms: outcome.latency_ms,
        }),
        _ => None,
    }
}

/// Emits transition events onto the notifier actor's channel
///
/// Sending never blocks the tick, delivery happens on the notifier task.
#[derive(Debug, Clone)]
pub struct TransitionNotifier {
    events: mpsc::UnboundedSender<TransitionEvent>,
}

impl TransitionNotifier {
    pub fn new(events: mpsc::UnboundedSender<TransitionEvent>) -> Self {
        Self { events }
    }

    /// Compare the replaced availability with the new outcome of `target`
    /// and emit an event on a state change
    pub fn observe(
        &self,
        target: &Target,
        previous: Option<Availability>,
        outcome: &ProbeOutcome,
    ) -> Option<TransitionEvent> {
        let kind = evaluate(previous, outcome)?;

        let event = TransitionEvent {
            owner_id: target.owner_id,
            target_id: target.id,
            url: target.url.clone(),
            kind,
            at: outcome.checked_at,
        };

        match &event.kind {
            TransitionKind::Downtime { error } => {
                warn!("{} went down: {}", event.url, error.as_deref().unwrap_or("bad status"))
            }
            TransitionKind::Recovery { .. } => warn!("{} recovered", event.url),
        }

        if self.events.send(event.clone()).is_err() {
            debug!("notifier is gone, dropping event for target {}", event.target_id);
        }

        Some(event)
    }
}
