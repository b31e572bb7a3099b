use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::timeout;

use crate::{EngineError, ResultEngine};

mod closing;
mod contra;
mod ledger;

/// How long a posting waits for a contended scope lock or for the closing
/// gate before giving up with a retryable conflict.
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded automatic retries for conflicts, with linear backoff.
pub(crate) const CONFLICT_RETRIES: u32 = 3;
pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Lock-per-key registry serializing the read-chain-append step per scope.
///
/// Postings to distinct scopes proceed fully in parallel; only the map
/// lookup itself goes through the (short-lived) std mutex.
#[derive(Debug, Default)]
struct ScopeLocks {
    inner: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl ScopeLocks {
    fn handle(&self, scope: &str) -> Arc<TokioMutex<()>> {
        let mut map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            map.entry(scope.to_string())
                .or_insert_with(|| Arc::new(TokioMutex::new(()))),
        )
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    scope_locks: ScopeLocks,
    /// Postings hold this for read; year-end aggregation holds it for write
    /// so no posting interleaves with the point-in-time view.
    closing_gate: RwLock<()>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) async fn lock_scope(&self, scope: &str) -> ResultEngine<OwnedMutexGuard<()>> {
        let lock = self.scope_locks.handle(scope);
        timeout(LOCK_TIMEOUT, lock.lock_owned())
            .await
            .map_err(|_| {
                EngineError::Conflict(format!("scope {scope} is locked by another posting"))
            })
    }

    /// Locks two scopes in sorted order so concurrent contras can never
    /// deadlock each other.
    pub(crate) async fn lock_scope_pair(
        &self,
        a: &str,
        b: &str,
    ) -> ResultEngine<(OwnedMutexGuard<()>, OwnedMutexGuard<()>)> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first_guard = self.lock_scope(first).await?;
        let second_guard = self.lock_scope(second).await?;
        Ok((first_guard, second_guard))
    }

    pub(crate) async fn posting_permit(&self) -> ResultEngine<RwLockReadGuard<'_, ()>> {
        timeout(LOCK_TIMEOUT, self.closing_gate.read())
            .await
            .map_err(|_| {
                EngineError::Conflict("year-end closing in progress, retry later".to_string())
            })
    }

    pub(crate) async fn closing_permit(&self) -> ResultEngine<RwLockWriteGuard<'_, ()>> {
        timeout(LOCK_TIMEOUT, self.closing_gate.write())
            .await
            .map_err(|_| {
                EngineError::Conflict("postings in flight, closing could not start".to_string())
            })
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            scope_locks: ScopeLocks::default(),
            closing_gate: RwLock::new(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bare_engine() -> Engine {
        Engine::builder().build().await.unwrap()
    }

    #[tokio::test]
    async fn posting_conflicts_while_closing_holds_the_gate() {
        let engine = bare_engine().await;
        let _closing = engine.closing_permit().await.unwrap();

        let err = engine.posting_permit().await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn closing_conflicts_while_a_posting_is_in_flight() {
        let engine = bare_engine().await;
        let _posting = engine.posting_permit().await.unwrap();

        let err = engine.closing_permit().await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn closing_proceeds_once_postings_drain() {
        let engine = bare_engine().await;
        let posting = engine.posting_permit().await.unwrap();
        drop(posting);

        assert!(engine.closing_permit().await.is_ok());
    }

    #[tokio::test]
    async fn contended_scope_lock_surfaces_conflict_and_leaves_others_free() {
        let engine = bare_engine().await;
        let _held = engine.lock_scope("ACC-1").await.unwrap();

        let err = engine.lock_scope("ACC-1").await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert!(engine.lock_scope("ACC-2").await.is_ok());
    }
}
