use crate::stats::JobType;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflicting job type: requested {requested} but the query implies {inferred}")]
    ConflictingJobType { requested: JobType, inferred: JobType },

    #[error("Internal consistency violated: {0}")]
    InternalConsistency(String),

    #[error("Precondition violated: {0}")]
    PreconditionViolated(String),
}

impl CoreError {
    /// True for errors caused by a malformed or contradictory request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_) | CoreError::ConflictingJobType { .. }
        )
    }
}
