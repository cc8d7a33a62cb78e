//! Bounded session pool.
//!
//! Acquiring waits for a free permit, so callers beyond `max_connections`
//! suspend until a session is released or the acquire timeout expires.

use super::{Connector, DatabaseSession};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of sessions checked out at once.
    pub max_connections: usize,
    /// Seconds to wait for a free session before failing.
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

struct PoolInner {
    connector: Arc<dyn Connector>,
    idle: Mutex<Vec<Box<dyn DatabaseSession>>>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    closed: AtomicBool,
}

impl PoolInner {
    /// Lock the idle list, recovering it if a holder panicked.
    fn idle(&self) -> MutexGuard<'_, Vec<Box<dyn DatabaseSession>>> {
        self.idle.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Idle session list was poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

/// A cloneable handle to a shared session pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub fn new(connector: Arc<dyn Connector>, config: &PoolConfig) -> Self {
        let max = config.max_connections.max(1);
        Self {
            inner: Arc::new(PoolInner {
                connector,
                idle: Mutex::new(Vec::new()),
                permits: Arc::new(Semaphore::new(max)),
                acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Check out a session, reusing an idle one when available.
    pub async fn acquire(&self) -> Result<PooledSession> {
        if self.is_closed() {
            return Err(crate::Error::Connection("Pool is closed".to_string()));
        }

        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            crate::Error::Connection(format!(
                "Timed out after {:?} waiting for a pooled connection",
                self.inner.acquire_timeout
            ))
        })?
        .map_err(|_| crate::Error::Connection("Pool is closed".to_string()))?;

        let reused = self.inner.idle().pop();
        let session = match reused {
            Some(session) => session,
            None => {
                tracing::debug!("Opening new pooled connection");
                self.inner.connector.connect().await?
            }
        };

        Ok(PooledSession {
            session: Some(session),
            pool: self.inner.clone(),
            discarded: AtomicBool::new(false),
            _permit: permit,
        })
    }

    /// Number of sessions that could be checked out right now.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Refuse further checkouts and drop idle sessions.
    ///
    /// Sessions already checked out stay usable and are dropped on release.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.permits.close();
        self.inner.idle().clear();
        tracing::info!("Connection pool closed");
    }
}

/// A checked-out session, returned to the pool on drop unless discarded.
pub struct PooledSession {
    session: Option<Box<dyn DatabaseSession>>,
    pool: Arc<PoolInner>,
    discarded: AtomicBool,
    _permit: OwnedSemaphorePermit,
}

impl PooledSession {
    /// Close the session on release instead of returning it to the pool.
    ///
    /// Used when the session's state is unknown, such as after a failed
    /// commit or rollback left a transaction open on it.
    pub fn discard(&self) {
        self.discarded.store(true, Ordering::SeqCst);
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::SeqCst)
    }
}

impl Deref for PooledSession {
    type Target = dyn DatabaseSession;

    fn deref(&self) -> &Self::Target {
        // Only taken in drop.
        match &self.session {
            Some(session) => session.as_ref(),
            None => unreachable!("pooled session used after release"),
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if self.is_discarded() {
                tracing::warn!("Discarding pooled connection");
            } else if !self.pool.closed.load(Ordering::SeqCst) {
                self.pool.idle().push(session);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryDatabase;

    fn pool(max: usize, timeout: u64) -> Pool {
        Pool::new(
            Arc::new(MemoryDatabase::new()),
            &PoolConfig {
                max_connections: max,
                acquire_timeout_secs: timeout,
            },
        )
    }

    #[tokio::test]
    async fn test_release_returns_permit() {
        let pool = pool(1, 1);
        let session = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);
        drop(session);
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let pool = pool(1, 0);
        let _held = pool.acquire().await.unwrap();
        match pool.acquire().await {
            Err(crate::Error::Connection(_)) => {}
            other => panic!("expected connection error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_discarded_session_frees_permit_only() {
        let pool = pool(1, 1);
        let session = pool.acquire().await.unwrap();
        session.discard();
        drop(session);
        assert_eq!(pool.available(), 1);
        assert!(pool.inner.idle().is_empty());

        let session = pool.acquire().await.unwrap();
        drop(session);
        assert_eq!(pool.inner.idle().len(), 1);
    }

    #[tokio::test]
    async fn test_poisoned_idle_list_still_serves() {
        let pool = pool(2, 1);
        let inner = pool.inner.clone();
        let _ = std::thread::spawn(move || {
            let _guard = inner.idle.lock().unwrap();
            panic!("poison the idle list");
        })
        .join();
        assert!(pool.inner.idle.is_poisoned());

        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.inner.idle().len(), 1);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool_refuses_checkout() {
        let pool = pool(2, 1);
        pool.close();
        assert!(matches!(pool.acquire().await, Err(crate::Error::Connection(_))));
    }
}
