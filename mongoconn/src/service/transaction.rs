//! Session-scoped units of work.

use std::time::Duration;

use futures::future::BoxFuture;
use mongodb::ClientSession;
use mongodb::error::{ErrorKind, UNKNOWN_TRANSACTION_COMMIT_RESULT, WriteFailure};
use tokio::time::Instant;
use tracing::debug;

use super::DocumentService;
use crate::error::MongoResult;

/// How long a commit with an unknown outcome keeps being retried.
pub const COMMIT_RETRY_WINDOW: Duration = Duration::from_secs(120);

/// Server error code for an exhausted `maxTimeMS`.
const MAX_TIME_MS_EXPIRED: i32 = 50;

impl DocumentService {
    /// Run `unit_of_work` inside a transaction.
    ///
    /// The transaction commits when the unit of work returns `Ok` and aborts
    /// when it returns `Err`; that error is returned unchanged. The session
    /// ends when this future completes or is dropped, whatever the outcome.
    ///
    /// A commit labelled `UnknownTransactionCommitResult` is retried for up
    /// to [`COMMIT_RETRY_WINDOW`]. The unit of work itself runs once: errors
    /// labelled `TransientTransactionError`, from the unit of work or from the
    /// commit, are returned to the caller, who may run the whole transaction
    /// again.
    ///
    /// ```rust,ignore
    /// let svc = service.clone();
    /// service
    ///     .with_transaction(move |session| {
    ///         Box::pin(async move {
    ///             svc.create_with_session(session, &order).await?;
    ///             svc.update_with_session(session, filter, update).await
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_transaction<T, F>(&self, unit_of_work: F) -> MongoResult<T>
    where
        F: for<'s> FnOnce(&'s mut ClientSession) -> BoxFuture<'s, MongoResult<T>>,
    {
        let client = self.handle.require_client()?;

        self.ctx
            .run(async move {
                let started = Instant::now();
                let mut session = client.start_session(None).await?;
                session.start_transaction(None).await?;

                let value = match unit_of_work(&mut session).await {
                    Ok(value) => value,
                    Err(err) => {
                        // Abort failure is ignored; the unit of work's error is returned.
                        let _ = session.abort_transaction().await;
                        return Err(err);
                    }
                };

                loop {
                    match session.commit_transaction().await {
                        Ok(()) => return Ok(value),
                        Err(e) if retry_commit(&e, started.elapsed()) => {
                            debug!(error = %e, "Retrying commit with unknown result");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            })
            .await
    }
}

/// Whether a failed commit should be attempted again.
fn retry_commit(error: &mongodb::error::Error, elapsed: Duration) -> bool {
    elapsed < COMMIT_RETRY_WINDOW
        && error.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
        && !max_time_expired(error)
}

fn max_time_expired(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Command(failure) => failure.code == MAX_TIME_MS_EXPIRED,
        ErrorKind::Write(WriteFailure::WriteConcernError(failure)) => {
            failure.code == MAX_TIME_MS_EXPIRED
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, WriteConcernError};

    fn write_concern_error(code: i32, labels: &[&str]) -> mongodb::error::Error {
        let failure: WriteConcernError = bson::from_document(doc! {
            "code": code,
            "codeName": "WriteConcernFailed",
            "errmsg": "waiting for replication timed out",
            "errorLabels": labels.to_vec(),
        })
        .unwrap();
        ErrorKind::Write(WriteFailure::WriteConcernError(failure)).into()
    }

    #[test]
    fn test_unknown_commit_result_is_retried() {
        let err = write_concern_error(64, &[UNKNOWN_TRANSACTION_COMMIT_RESULT]);
        assert!(err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT));
        assert!(retry_commit(&err, Duration::ZERO));
        assert!(retry_commit(&err, Duration::from_secs(119)));
    }

    #[test]
    fn test_commit_retry_stops_at_window() {
        let err = write_concern_error(64, &[UNKNOWN_TRANSACTION_COMMIT_RESULT]);
        assert!(!retry_commit(&err, COMMIT_RETRY_WINDOW));
    }

    #[test]
    fn test_commit_not_retried_without_label() {
        let transient = write_concern_error(64, &[TRANSIENT_TRANSACTION_ERROR]);
        assert!(!retry_commit(&transient, Duration::ZERO));

        let plain = mongodb::error::Error::custom("boom");
        assert!(!retry_commit(&plain, Duration::ZERO));
    }

    #[test]
    fn test_max_time_expired_not_retried() {
        let err = write_concern_error(MAX_TIME_MS_EXPIRED, &[UNKNOWN_TRANSACTION_COMMIT_RESULT]);
        assert!(!retry_commit(&err, Duration::ZERO));
    }
}
