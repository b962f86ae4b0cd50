use thiserror::Error;

use crate::workflow::step::WorkflowStep;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("cursor regression on {field}: {from} -> {to}")]
    CursorRegression { field: &'static str, from: usize, to: usize },
    #[error("invalid workflow transition from {from:?} to {to:?}")]
    InvalidTransition { from: WorkflowStep, to: WorkflowStep },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown workflow thread: {0}")]
    UnknownThread(String),
}

#[cfg(test)]
mod tests {
    use super::{ApplicationError, DomainError};

    #[test]
    fn domain_errors_wrap_into_application_errors() {
        let error = ApplicationError::from(DomainError::CursorRegression {
            field: "current_slot_index",
            from: 3,
            to: 1,
        });

        assert!(matches!(error, ApplicationError::Domain(DomainError::CursorRegression { .. })));
        assert_eq!(error.to_string(), "cursor regression on current_slot_index: 3 -> 1");
    }
}
