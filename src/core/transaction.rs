//! Transaction coordination.
//!
//! A transactional plan runs entirely on one pooled session. The transaction
//! is opened before the first stage and closed exactly once: committed when
//! every stage succeeds, rolled back on the first failing unit.

use super::db::Db;
use super::scheduler::{run_stages, JoinPolicy, PlanFailure, PlanOutput};
use crate::models::plan::Plan;
use crate::session::{DatabaseSession, Pool, PooledSession, TransactionId};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Token scoping units to one open transaction. Clones share the token.
#[derive(Clone)]
pub struct TransactionHandle {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    id: TransactionId,
    session: PooledSession,
    closed: AtomicBool,
}

impl TransactionHandle {
    /// Check out a session and begin a transaction on it.
    pub(crate) async fn begin(pool: &Pool) -> Result<Self> {
        let session = pool.acquire().await?;
        let id = session.begin_transaction().await?;
        tracing::info!("Began transaction {}", id);
        Ok(Self {
            inner: Arc::new(TransactionInner {
                id,
                session,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    /// Whether commit or rollback has been issued.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The session the transaction lives on.
    pub(crate) fn session(&self) -> &(dyn DatabaseSession + 'static) {
        &*self.inner.session
    }

    /// Keep the session out of the pool once this handle is released.
    fn discard_session(&self) {
        self.inner.session.discard();
    }

    fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Err(crate::Error::Transaction(format!(
                "Transaction {} is already closed",
                self.inner.id
            )));
        }
        Ok(())
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        self.close()?;
        self.session().commit(self.inner.id).await?;
        tracing::info!("Committed transaction {}", self.inner.id);
        Ok(())
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        self.close()?;
        self.session().rollback(self.inner.id).await?;
        tracing::info!("Rolled back transaction {}", self.inner.id);
        Ok(())
    }
}

/// Run `plan` inside one transaction.
pub(crate) async fn run_in_transaction(
    db: &Db,
    plan: &Plan,
) -> std::result::Result<PlanOutput, PlanFailure> {
    let handle = TransactionHandle::begin(db.pool())
        .await
        .map_err(PlanFailure::empty)?;

    match run_stages(db, plan, Some(&handle), JoinPolicy::StopOnFailure).await {
        Ok(output) => match handle.commit().await {
            Ok(()) => Ok(output),
            Err(error) => {
                tracing::error!("Commit of transaction {} failed: {}", handle.id(), error);
                handle.discard_session();
                Err(PlanFailure {
                    error,
                    results: output.results,
                    stats: output.stats,
                })
            }
        },
        Err(failure) => {
            let rollback_error = match handle.rollback().await {
                Ok(()) => None,
                Err(error) => {
                    tracing::error!("Rollback of transaction {} failed: {}", handle.id(), error);
                    handle.discard_session();
                    Some(error)
                }
            };
            Err(failure.map_error(|error| crate::Error::aborted(error, rollback_error)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryDatabase, PoolConfig};

    #[tokio::test]
    async fn test_handle_closes_once() {
        let pool = Pool::new(Arc::new(MemoryDatabase::new()), &PoolConfig::default());
        let handle = TransactionHandle::begin(&pool).await.unwrap();
        let copy = handle.clone();

        handle.commit().await.unwrap();
        assert!(copy.is_closed());
        assert!(matches!(copy.rollback().await, Err(crate::Error::Transaction(_))));
    }

    #[tokio::test]
    async fn test_handle_holds_one_session() {
        let pool = Pool::new(
            Arc::new(MemoryDatabase::new()),
            &PoolConfig {
                max_connections: 2,
                acquire_timeout_secs: 1,
            },
        );
        let handle = TransactionHandle::begin(&pool).await.unwrap();
        assert_eq!(pool.available(), 1);

        handle.rollback().await.unwrap();
        drop(handle);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_discarded_session_is_not_reused() {
        let memory = MemoryDatabase::new();
        let pool = Pool::new(Arc::new(memory.clone()), &PoolConfig::default());
        memory
            .session()
            .execute("", "CREATE TABLE t (id int)", &crate::models::value::Params::new())
            .await
            .unwrap();

        let handle = TransactionHandle::begin(&pool).await.unwrap();
        handle
            .session()
            .execute("", "INSERT INTO t VALUES (1)", &crate::models::value::Params::new())
            .await
            .unwrap();
        handle.discard_session();
        drop(handle);

        let session = pool.acquire().await.unwrap();
        let params = crate::models::value::Params::new();
        let trancount = session.scalar("", "SELECT @@TRANCOUNT", &params).await.unwrap();
        let count = session.scalar("", "SELECT COUNT(*) FROM t", &params).await.unwrap();
        assert_eq!(trancount.value, serde_json::json!(0));
        assert_eq!(count.value, serde_json::json!(0));
    }
}
