use sea_orm::{DatabaseTransaction, TransactionTrait};
use tracing::debug;

use crate::error::ClosureTreeError;

/// Transaction scope for multi-statement mutations.
///
/// Begun on a `DatabaseConnection` this is a regular transaction; begun on a
/// caller's `DatabaseTransaction` it becomes a savepoint, so the caller keeps
/// the outer rollback decision. Dropping the scope without committing rolls
/// it back.
pub struct ScopedTransaction {
    txn: DatabaseTransaction,
}

impl ScopedTransaction {
    pub async fn begin<C>(conn: &C) -> Result<Self, ClosureTreeError>
    where
        C: TransactionTrait,
    {
        let txn = conn.begin().await?;
        Ok(Self { txn })
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), ClosureTreeError> {
        self.txn.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), ClosureTreeError> {
        self.txn.rollback().await?;
        Ok(())
    }

    /// Commit on `Ok`, roll back on `Err`, and hand the outcome back.
    ///
    /// A rollback failure is logged and the original error wins.
    pub async fn finish<T>(
        self,
        result: Result<T, ClosureTreeError>,
    ) -> Result<T, ClosureTreeError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    debug!(error = %rollback_err, "rollback after failed mutation also failed");
                }
                Err(err)
            }
        }
    }
}
