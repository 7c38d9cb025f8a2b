//! Atomic batch scope
//!
//! Inside [`batch`], every create/update/delete a [`Manager`] issues is
//! staged instead of executed, and the staged writes are committed as one
//! atomic commit when the scope finishes with `Ok`. When the scope returns
//! `Err` nothing is committed.
//!
//! The active batch is tokio task-local: other tasks (including tasks
//! spawned from inside the scope) write directly as usual.
//!
//! [`Manager`]: super::Manager

use super::database::Database;
use crate::error::{OdmError, Result};
use crate::firestore::{ClientProvider, WriteBatch, WriteOperation};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

struct ActiveBatch {
    provider: ClientProvider,
    writes: Mutex<Vec<WriteOperation>>,
}

tokio::task_local! {
    static ACTIVE_BATCH: ActiveBatch;
}

/// Whether the current task is inside a batch scope
pub fn in_batch() -> bool {
    ACTIVE_BATCH.try_with(|_| ()).is_ok()
}

/// Stage a write in the active batch
///
/// Hands the write back when no batch is active, so the caller can execute
/// it directly. A write whose manager uses another client than the batch
/// database fails with [`OdmError::ForeignBatch`] and is not staged.
pub(crate) fn stage(
    provider: &ClientProvider,
    document_type: &'static str,
    write: WriteOperation,
) -> Result<Option<WriteOperation>> {
    let mut pending = Some(write);
    let staged = ACTIVE_BATCH.try_with(|batch| {
        if !batch.provider.same_provider(provider) {
            return Err(OdmError::ForeignBatch { document_type });
        }
        if let Some(write) = pending.take() {
            tracing::debug!(target: "firestore_odm::atomic", path = write.path(), "staged write");
            batch
                .writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(write);
        }
        Ok(())
    });
    match staged {
        Ok(result) => result.map(|()| None),
        Err(_) => Ok(pending),
    }
}

/// Run `scope` with an active batch and commit its writes on success
///
/// Fails with [`OdmError::NestedBatch`] when called inside another batch
/// scope of the same task. The staged writes are committed through
/// `database`'s client; an empty batch commits nothing. Only managers of
/// `database` may write inside the scope.
///
/// # Example
/// ```no_run
/// # use firestore_odm::{atomic, Database, Document, DocumentExt, OdmError};
/// # async fn example<P: Document + Clone>(db: Database, mut a: P, mut b: P) -> Result<(), OdmError> {
/// let products = db.manager::<P>()?;
/// atomic::batch(&db, move || async move {
///     a.save(&products).await?;
///     b.save(&products).await?;
///     Ok::<_, OdmError>(())
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn batch<F, Fut, T, E>(database: &Database, scope: F) -> std::result::Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<OdmError> + Display,
{
    if in_batch() {
        return Err(OdmError::NestedBatch.into());
    }

    let active = ActiveBatch {
        provider: database.provider().clone(),
        writes: Mutex::new(Vec::new()),
    };
    let (outcome, writes) = ACTIVE_BATCH
        .scope(active, async {
            let outcome = scope().await;
            let writes = ACTIVE_BATCH.with(|batch| {
                std::mem::take(&mut *batch.writes.lock().unwrap_or_else(PoisonError::into_inner))
            });
            (outcome, writes)
        })
        .await;

    match outcome {
        Ok(value) => {
            commit(database, writes).await?;
            Ok(value)
        }
        Err(err) => {
            if !writes.is_empty() {
                tracing::warn!(
                    target: "firestore_odm::atomic",
                    discarded = writes.len(),
                    error = %err,
                    "batch scope failed; staged writes discarded"
                );
            }
            Err(err)
        }
    }
}

async fn commit(database: &Database, writes: Vec<WriteOperation>) -> Result<()> {
    if writes.is_empty() {
        return Ok(());
    }
    let mut batch = WriteBatch::new(database.client().await?);
    for write in writes {
        batch.push(write);
    }
    tracing::info!(target: "firestore_odm::atomic", writes = batch.len(), "committing batch");
    batch.commit().await?;
    Ok(())
}
