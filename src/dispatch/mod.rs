use crate::event::{validate_delta, LiveDelta, Tag, ValidationError};
use crate::store::{AppliedChange, LiveStore};
use std::sync::Arc;
use tracing::warn;

/// Result of routing one delta
#[derive(Debug)]
pub enum DispatchOutcome {
    Applied(AppliedChange),
    /// Routed, but the collection did not change (delete of an absent id)
    Unchanged,
    Dropped(DropReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    UnknownDomain(String),
    UnknownAction(String),
    Invalid(ValidationError),
}

/// Routes decoded deltas to the matching domain collection.
///
/// Sole writer for incremental updates; pure lookup, no business logic.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<LiveStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<LiveStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<LiveStore> {
        &self.store
    }

    pub fn dispatch(&self, delta: LiveDelta) -> DispatchOutcome {
        let domain = match &delta.domain {
            Tag::Known(domain) => *domain,
            Tag::Unrecognized(name) => {
                warn!(domain = %name, id = %delta.data.id, "Unknown delta domain, dropping");
                return DispatchOutcome::Dropped(DropReason::UnknownDomain(name.clone()));
            }
        };

        let action = match &delta.action {
            Tag::Known(action) => *action,
            Tag::Unrecognized(name) => {
                warn!(domain = %domain, action = %name, "Unknown delta action, dropping");
                return DispatchOutcome::Dropped(DropReason::UnknownAction(name.clone()));
            }
        };

        if let Err(e) = validate_delta(&delta) {
            warn!(domain = %domain, action = %action, error = %e, "Invalid delta, dropping");
            return DispatchOutcome::Dropped(DropReason::Invalid(e));
        }

        match self
            .store
            .apply_delta(domain, action, delta.data, delta.emitted_at)
        {
            Some(change) => DispatchOutcome::Applied(change),
            None => DispatchOutcome::Unchanged,
        }
    }
}
