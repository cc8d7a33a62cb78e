//! Database session seam.
//!
//! The orchestration core talks to a database only through [`DatabaseSession`].
//! A session is one logical connection: it runs statements, returns their
//! recordsets together with the raw server messages, and manages at most one
//! open transaction. Drivers, mocks and the in-memory store all plug in here.

pub mod memory;
pub mod pool;
mod statement;

pub use memory::{MemoryDatabase, MemorySession};
pub use pool::{Pool, PoolConfig, PooledSession};

use crate::models::message::RawMessage;
use crate::models::table::TableSpec;
use crate::models::value::{Params, Row};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of a transaction opened on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a statement batch produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    /// Recordsets in the order the batch produced them.
    pub recordsets: Vec<Vec<Row>>,
    /// Server messages in emission order, unclassified.
    pub messages: Vec<RawMessage>,
}

/// A projected result with its unclassified messages.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutcome<T> {
    pub value: T,
    pub messages: Vec<RawMessage>,
}

/// One logical database connection.
#[async_trait]
pub trait DatabaseSession: Send + Sync {
    /// Run a statement batch. `context` is the caller's connection context tag.
    async fn execute(&self, context: &str, statement: &str, params: &Params) -> Result<RawResult>;

    /// Create a table from the descriptor and load its rows.
    async fn bulk_create(&self, context: &str, table: &TableSpec) -> Result<Vec<RawMessage>>;

    /// Load the descriptor's rows into an existing table.
    async fn bulk_insert(&self, context: &str, table: &TableSpec) -> Result<Vec<RawMessage>>;

    async fn begin_transaction(&self) -> Result<TransactionId>;

    async fn commit(&self, tx: TransactionId) -> Result<()>;

    async fn rollback(&self, tx: TransactionId) -> Result<()>;

    /// First column of the first row of the first recordset.
    async fn scalar(&self, context: &str, statement: &str, params: &Params) -> Result<RawOutcome<Value>> {
        let raw = self.execute(context, statement, params).await?;
        let value = raw
            .recordsets
            .first()
            .and_then(|rs| rs.first())
            .and_then(|row| row.values().next().cloned())
            .unwrap_or(Value::Null);
        Ok(RawOutcome {
            value,
            messages: raw.messages,
        })
    }

    /// First row of the first recordset, or null.
    async fn row(&self, context: &str, statement: &str, params: &Params) -> Result<RawOutcome<Value>> {
        let raw = self.execute(context, statement, params).await?;
        let value = raw
            .recordsets
            .into_iter()
            .next()
            .and_then(|rs| rs.into_iter().next())
            .map(Value::Object)
            .unwrap_or(Value::Null);
        Ok(RawOutcome {
            value,
            messages: raw.messages,
        })
    }

    /// The first recordset, empty when the batch produced none.
    async fn recordset(&self, context: &str, statement: &str, params: &Params) -> Result<RawOutcome<Vec<Row>>> {
        let raw = self.execute(context, statement, params).await?;
        Ok(RawOutcome {
            value: raw.recordsets.into_iter().next().unwrap_or_default(),
            messages: raw.messages,
        })
    }

    /// Every recordset of the batch.
    async fn multi_recordset(
        &self,
        context: &str,
        statement: &str,
        params: &Params,
    ) -> Result<RawOutcome<Vec<Vec<Row>>>> {
        let raw = self.execute(context, statement, params).await?;
        Ok(RawOutcome {
            value: raw.recordsets,
            messages: raw.messages,
        })
    }

    /// Run for side effects only.
    async fn command(&self, context: &str, statement: &str, params: &Params) -> Result<RawOutcome<()>> {
        let raw = self.execute(context, statement, params).await?;
        Ok(RawOutcome {
            value: (),
            messages: raw.messages,
        })
    }
}

/// Opens new sessions for a [`Pool`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DatabaseSession>>;
}
