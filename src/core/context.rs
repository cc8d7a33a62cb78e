//! Per-unit execution context.

use super::db::Db;
use super::transaction::TransactionHandle;
use crate::models::outcome::Outcome;
use crate::models::table::TableSpec;
use crate::models::tree::{Key, StageTree};
use crate::models::value::{Params, Row};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;

/// What a unit receives when it is invoked.
///
/// Statement helpers on the context use the database's default connection
/// context and, inside a transactional plan, the plan's transaction.
#[derive(Clone)]
pub struct UnitContext {
    db: Db,
    transaction: Option<TransactionHandle>,
    prior: Option<Arc<StageTree<Value>>>,
    key: Key,
}

impl UnitContext {
    pub(crate) fn new(
        db: Db,
        transaction: Option<TransactionHandle>,
        prior: Option<Arc<StageTree<Value>>>,
        key: Key,
    ) -> Self {
        Self {
            db,
            transaction,
            prior,
            key,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// The plan's transaction, when running under `exec_trans_tasks`.
    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    /// Results of the previous stage. `None` in the first stage.
    pub fn prior(&self) -> Option<&StageTree<Value>> {
        self.prior.as_deref()
    }

    /// This unit's name or index within its stage.
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub async fn scalar(&self, statement: &str, params: &Params) -> Result<Outcome<Value>> {
        self.db
            .scalar(self.db.context(), statement, params, self.transaction())
            .await
    }

    pub async fn row(&self, statement: &str, params: &Params) -> Result<Outcome<Value>> {
        self.db
            .row(self.db.context(), statement, params, self.transaction())
            .await
    }

    pub async fn recordset(&self, statement: &str, params: &Params) -> Result<Outcome<Vec<Row>>> {
        self.db
            .recordset(self.db.context(), statement, params, self.transaction())
            .await
    }

    pub async fn multi_recordset(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<Outcome<Vec<Vec<Row>>>> {
        self.db
            .multi_recordset(self.db.context(), statement, params, self.transaction())
            .await
    }

    pub async fn command(&self, statement: &str, params: &Params) -> Result<Outcome<()>> {
        self.db
            .command(self.db.context(), statement, params, self.transaction())
            .await
    }

    pub async fn bulk_create(&self, table: &TableSpec) -> Result<Outcome<()>> {
        self.db
            .bulk_create(self.db.context(), table, self.transaction())
            .await
    }

    pub async fn bulk_insert(&self, table: &TableSpec) -> Result<Outcome<()>> {
        self.db
            .bulk_insert(self.db.context(), table, self.transaction())
            .await
    }
}
