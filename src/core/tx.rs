use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};

use crate::core::error::{AppError, Result};

/// Transaction handle passed to [`run`] closures.
pub type PgTx = Transaction<'static, Postgres>;

/// Runs `op` inside a single transaction.
///
/// Commits on `Ok`, rolls back on `Err` and returns the original error
/// unmodified. A failed rollback is reported as
/// [`AppError::RollbackFailed`] wrapping both errors. Closures must own
/// their captures (clone before the call); the handle is the only
/// borrowed input.
pub async fn run<T, F>(pool: &PgPool, op: F) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut PgTx) -> BoxFuture<'t, Result<T>> + Send,
    T: Send,
{
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!("Failed to begin transaction: {:?}", e);
        AppError::Database(e)
    })?;

    match op(&mut tx).await {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                tracing::error!("Failed to commit transaction: {:?}", e);
                AppError::Database(e)
            })?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => {
                tracing::error!("Rollback failed after {:?}: {:?}", err, rollback);
                Err(AppError::RollbackFailed {
                    original: Box::new(err),
                    rollback,
                })
            }
        },
    }
}
