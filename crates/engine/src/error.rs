use std::time::Duration;

use leaderboard_core::error::CoreError;

/// Boxed backend error carried by [`EngineError::Upstream`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the engine's service operations.
///
/// Wraps [`CoreError`] for domain errors and adds variants for failures of
/// the persistence backend and of the call's deadline or cancellation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The persistence backend (or another collaborator) failed.
    #[error("{operation} failed: {source}")]
    Upstream {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },
}

/// Convenience alias for engine return values.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn upstream(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Upstream {
            operation,
            source: Box::new(source),
        }
    }

    /// True when the caller sent a malformed or contradictory request.
    /// Everything else is a server-side failure.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Core(core) if core.is_validation())
    }
}
