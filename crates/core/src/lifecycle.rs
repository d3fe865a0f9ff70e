//! Record lifecycle state machine.
//!
//! The sole writer of `Record::status`. Every status change in the system,
//! single-record HR actions and bulk dispatch alike, goes through
//! [`LifecycleMachine::apply`] so the stored history is always a valid path
//! through the adjacency graph.

use chrono::Utc;
use thiserror::Error;

use crate::domain::{Record, RecordStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: RecordStatus, to: RecordStatus },
    #[error("cannot leave terminal status {status:?}")]
    Terminal { status: RecordStatus },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleMachine;

impl LifecycleMachine {
    pub fn new() -> Self {
        Self
    }

    /// Validate a transition without applying it.
    pub fn validate(&self, from: RecordStatus, to: RecordStatus) -> Result<(), TransitionError> {
        use RecordStatus::{Approved, Completed, Removed, Rendered, Reviewing, SentToPoc};

        let allowed = match (from, to) {
            (Reviewing, Rendered)
            | (Rendered, Approved)
            | (Approved, SentToPoc)
            | (SentToPoc, Completed) => true,
            // Soft delete is reachable from any non-terminal state.
            (Reviewing, Removed) | (Rendered, Removed) | (Approved, Removed)
            | (SentToPoc, Removed) => true,
            _ => false,
        };

        if allowed {
            return Ok(());
        }

        match from {
            Completed | Removed => Err(TransitionError::Terminal { status: from }),
            _ => Err(TransitionError::InvalidTransition { from, to }),
        }
    }

    /// Apply a validated transition to the record in place.
    pub fn apply(&self, record: &mut Record, to: RecordStatus) -> Result<(), TransitionError> {
        self.validate(record.status, to)?;
        record.status = to;
        record.updated_at = Utc::now();
        Ok(())
    }
}
