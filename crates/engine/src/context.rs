//! Per-call deadline and cancellation.
//!
//! Every persistence call made by the services runs through a
//! [`CallContext`]. Hitting the deadline or the cancellation token drops the
//! in-flight future, which returns any pooled connection it held.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct CallContext {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(timeout: Duration) -> Self {
        Self::with_cancellation(timeout, CancellationToken::new())
    }

    pub fn with_cancellation(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `fut` under the deadline, aborting early if the call is cancelled.
    pub async fn run<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = T>,
    ) -> EngineResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(operation, "Call cancelled");
                Err(EngineError::Cancelled { operation })
            }
            outcome = tokio::time::timeout(self.timeout, fut) => match outcome {
                Ok(value) => Ok(value),
                Err(_) => {
                    tracing::error!(operation, timeout = ?self.timeout, "Call timed out");
                    Err(EngineError::Timeout {
                        operation,
                        timeout: self.timeout,
                    })
                }
            },
        }
    }

    /// Like [`run`](Self::run) for a fallible call; its error becomes
    /// [`EngineError::Upstream`].
    pub async fn bounded<T, E>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> EngineResult<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.run(operation, fut).await?.map_err(|e| {
            tracing::error!(operation, error = %e, "Persistence call failed");
            EngineError::upstream(operation, e)
        })
    }
}
