use anyhow::Result;
use futures::future::BoxFuture;
use sqlx::SqliteConnection;
use storage::Storage;
use tracing::error;

/// Runs `handler` inside a data-store transaction: commit on `Ok`, rollback
/// on `Err`, returning the handler's error unchanged either way.
///
/// The handler receives the transaction handle explicitly and it is the only
/// way to touch the store for the duration of the call, so exactly one
/// transaction is open per in-flight action. Nested calls are unsupported.
/// Rollback only governs the persisted store; reverting in-memory component
/// state after a failure is the handler's own responsibility.
pub async fn with_transaction<T, F>(storage: &Storage, handler: F) -> Result<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>> + Send,
{
    let mut tx = storage.begin().await?;
    let result = handler(&mut *tx).await;
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(%rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
