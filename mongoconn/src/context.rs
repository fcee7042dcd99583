//! Caller-supplied deadline and cancellation for document operations.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{MongoError, MongoResult};

/// Deadline and cancellation applied to each operation of a
/// [`DocumentService`](crate::DocumentService).
///
/// The default has no deadline and is never cancelled. Cancelling the token
/// aborts in-flight operations bound to this context only.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl OperationContext {
    /// Create a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every operation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use `token` for cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The token that cancels operations bound to this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel operations bound to this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` under this context.
    pub(crate) async fn run<T>(&self, fut: impl Future<Output = MongoResult<T>>) -> MongoResult<T> {
        let bounded = async {
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, fut)
                    .await
                    .map_err(|_| MongoError::timeout(timeout))?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MongoError::Cancelled),
            result = bounded => result,
        }
    }
}
