//! Database facade.
//!
//! `Db` is the library entry point. It owns the session pool, the diagnostic
//! boundaries and the script catalog, and exposes:
//! - the statement primitives, each returning a value with classified stats
//! - `exec_tasks` / `exec_trans_tasks` for staged plans
//! - `run_scripts` for catalog scripts

use super::diagnostics::Boundaries;
use super::normalizer::normalize;
use super::scheduler::{run_stages, JoinPolicy, PlanFailure, PlanOutput};
use super::scripts::ScriptCatalog;
use super::transaction::{run_in_transaction, TransactionHandle};
use crate::models::config::Config;
use crate::models::message::UnitStats;
use crate::models::outcome::Outcome;
use crate::models::plan::TaskSpec;
use crate::models::table::TableSpec;
use crate::models::value::{Params, Row};
use crate::session::{Connector, DatabaseSession, Pool, PooledSession, RawOutcome};
use crate::Result;
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

/// Shared handle to a database. Cloning is cheap.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    pool: Pool,
    boundaries: Boundaries,
    context: String,
    scripts: ScriptCatalog,
}

/// Session used by one call: pooled, or the transaction's own.
enum SessionRef<'a> {
    Pooled(PooledSession),
    Transaction(&'a TransactionHandle),
}

impl Deref for SessionRef<'_> {
    type Target = dyn DatabaseSession;

    fn deref(&self) -> &Self::Target {
        match self {
            SessionRef::Pooled(session) => &**session,
            SessionRef::Transaction(handle) => handle.session(),
        }
    }
}

impl Db {
    /// Create a database handle opening sessions through `connector`.
    pub fn new(connector: Arc<dyn Connector>, config: &Config) -> Self {
        Self {
            inner: Arc::new(DbInner {
                pool: Pool::new(connector, &config.pool),
                boundaries: config.diagnostics.boundaries(),
                context: config.context.clone(),
                scripts: config.scripts.clone(),
            }),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }

    pub fn boundaries(&self) -> Boundaries {
        self.inner.boundaries
    }

    /// Default connection context tag.
    pub fn context(&self) -> &str {
        &self.inner.context
    }

    pub fn scripts(&self) -> &ScriptCatalog {
        &self.inner.scripts
    }

    /// Run a plan without a transaction.
    ///
    /// Every unit of a stage settles before the run stops; the reported error
    /// is the earliest-declared failing unit's.
    pub async fn exec_tasks(&self, spec: TaskSpec) -> std::result::Result<PlanOutput, PlanFailure> {
        let plan = normalize(spec).map_err(PlanFailure::empty)?;
        tracing::debug!("Executing plan with {} stage(s)", plan.stages().len());
        run_stages(self, &plan, None, JoinPolicy::WaitAll).await
    }

    /// Run a plan inside one transaction, rolling back on the first failure.
    pub async fn exec_trans_tasks(
        &self,
        spec: TaskSpec,
    ) -> std::result::Result<PlanOutput, PlanFailure> {
        let plan = normalize(spec).map_err(PlanFailure::empty)?;
        tracing::debug!(
            "Executing transactional plan with {} stage(s)",
            plan.stages().len()
        );
        run_in_transaction(self, &plan).await
    }

    pub async fn scalar(
        &self,
        context: &str,
        statement: &str,
        params: &Params,
        transaction: Option<&TransactionHandle>,
    ) -> Result<Outcome<Value>> {
        let session = self.session(transaction).await?;
        let raw = session.scalar(context, statement, params).await?;
        self.classify(raw)
    }

    pub async fn row(
        &self,
        context: &str,
        statement: &str,
        params: &Params,
        transaction: Option<&TransactionHandle>,
    ) -> Result<Outcome<Value>> {
        let session = self.session(transaction).await?;
        let raw = session.row(context, statement, params).await?;
        self.classify(raw)
    }

    pub async fn recordset(
        &self,
        context: &str,
        statement: &str,
        params: &Params,
        transaction: Option<&TransactionHandle>,
    ) -> Result<Outcome<Vec<Row>>> {
        let session = self.session(transaction).await?;
        let raw = session.recordset(context, statement, params).await?;
        self.classify(raw)
    }

    pub async fn multi_recordset(
        &self,
        context: &str,
        statement: &str,
        params: &Params,
        transaction: Option<&TransactionHandle>,
    ) -> Result<Outcome<Vec<Vec<Row>>>> {
        let session = self.session(transaction).await?;
        let raw = session.multi_recordset(context, statement, params).await?;
        self.classify(raw)
    }

    pub async fn command(
        &self,
        context: &str,
        statement: &str,
        params: &Params,
        transaction: Option<&TransactionHandle>,
    ) -> Result<Outcome<()>> {
        let session = self.session(transaction).await?;
        let raw = session.command(context, statement, params).await?;
        self.classify(raw)
    }

    /// Create a table from `table` and load its rows.
    pub async fn bulk_create(
        &self,
        context: &str,
        table: &TableSpec,
        transaction: Option<&TransactionHandle>,
    ) -> Result<Outcome<()>> {
        let session = self.session(transaction).await?;
        let messages = session.bulk_create(context, table).await?;
        tracing::debug!("Bulk created {} with {} row(s)", table.name, table.data.len());
        self.classify(RawOutcome { value: (), messages })
    }

    /// Append the rows of `table` to an existing table.
    pub async fn bulk_insert(
        &self,
        context: &str,
        table: &TableSpec,
        transaction: Option<&TransactionHandle>,
    ) -> Result<Outcome<()>> {
        let session = self.session(transaction).await?;
        let messages = session.bulk_insert(context, table).await?;
        tracing::debug!("Bulk inserted {} row(s) into {}", table.data.len(), table.name);
        self.classify(RawOutcome { value: (), messages })
    }

    /// Run every statement under a catalog path on one session.
    ///
    /// Stops at the first failing statement. The value is the number of
    /// statements run.
    pub async fn run_scripts(&self, path: &str, params: &Params) -> Result<Outcome<usize>> {
        let statements = self.inner.scripts.resolve(path)?;
        let session = self.inner.pool.acquire().await?;
        let mut stats = UnitStats::new();

        tracing::info!("Running {} script statement(s) from '{}'", statements.len(), path);
        for (i, statement) in statements.iter().enumerate() {
            let raw = session.command(self.context(), statement, params).await?;
            let outcome = self.classify(raw).map_err(|err| {
                tracing::warn!("Script statement {} of '{}' failed: {}", i, path, err);
                err
            })?;
            stats.extend(outcome.stats);
        }

        Ok(Outcome::new(statements.len(), stats))
    }

    /// Close the pool. Sessions in use finish their work and are discarded.
    pub fn close(&self) {
        self.inner.pool.close();
    }

    async fn session<'a>(&self, transaction: Option<&'a TransactionHandle>) -> Result<SessionRef<'a>> {
        match transaction {
            Some(handle) if handle.is_closed() => Err(crate::Error::Transaction(format!(
                "Transaction {} is already closed",
                handle.id()
            ))),
            Some(handle) => Ok(SessionRef::Transaction(handle)),
            None => Ok(SessionRef::Pooled(self.inner.pool.acquire().await?)),
        }
    }

    fn classify<T>(&self, raw: RawOutcome<T>) -> Result<Outcome<T>> {
        let stats = self.inner.boundaries.classify(raw.messages)?;
        Ok(Outcome::new(raw.value, stats))
    }
}
