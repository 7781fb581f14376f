use super::LiveDelta;
use thiserror::Error;

/// Validation errors for LiveDelta
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("record id is required")]
    MissingId,
    #[error("record id '{0}' has surrounding whitespace")]
    UntrimmedId(String),
}

/// Validates a decoded delta before it reaches a collection.
///
/// Rules:
/// - `data.id` must be non-empty
/// - `data.id` must not carry leading/trailing whitespace (it would never
///   match the id a later update or delete refers to)
pub fn validate_delta(delta: &LiveDelta) -> Result<(), ValidationError> {
    let id = &delta.data.id;

    if id.is_empty() {
        return Err(ValidationError::MissingId);
    }

    if id.trim() != id {
        return Err(ValidationError::UntrimmedId(id.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use crate::event::{DeltaAction, Domain, DomainRecord};

    #[test]
    fn test_valid_ids() {
        for id in ["w1", "fire-2024-001", "a b"] {
            let delta = LiveDelta::new(Domain::Weather, DeltaAction::Create, DomainRecord::new(id));
            assert!(validate_delta(&delta).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_invalid_ids() {
        let empty = LiveDelta::new(Domain::Fire, DeltaAction::Update, DomainRecord::new(""));
        assert_eq!(validate_delta(&empty), Err(ValidationError::MissingId));

        let padded = LiveDelta::new(Domain::Fire, DeltaAction::Update, DomainRecord::new(" f1"));
        assert!(matches!(
            validate_delta(&padded),
            Err(ValidationError::UntrimmedId(_))
        ));
    }
}
