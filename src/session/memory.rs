//! In-memory database session.
//!
//! All sessions created from one [`MemoryDatabase`] share its tables. A
//! transaction locks the whole store from begin until commit or rollback and
//! restores a snapshot on rollback, so sessions outside the transaction wait
//! for it to finish before they can read or write.

use super::statement::{self, ColumnDef, Expr, Filter, Statement};
use super::{Connector, DatabaseSession, RawResult, TransactionId};
use crate::models::message::RawMessage;
use crate::models::table::TableSpec;
use crate::models::value::{DbType, DbValue, Params, Row};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Severity the in-memory session gives `PRINT` output.
pub const PRINT_SEVERITY: u8 = 0;

#[derive(Debug, Clone)]
struct Column {
    name: String,
    ty: Option<DbType>,
    nullable: bool,
    primary: bool,
}

impl Column {
    /// Integer columns accept integers bound as text.
    fn coerce(&self, value: DbValue) -> DbValue {
        match (self.ty, value) {
            (Some(DbType::BigInt | DbType::Int), DbValue::Text(s)) => {
                s.trim().parse::<i64>().map(DbValue::Int).unwrap_or(DbValue::Text(s))
            }
            (_, value) => value,
        }
    }
}

#[derive(Debug, Clone)]
struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<DbValue>>,
}

impl Table {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn to_row(&self, values: &[DbValue]) -> Row {
        self.columns
            .iter()
            .zip(values)
            .map(|(c, v)| (c.name.clone(), Value::from(v.clone())))
            .collect()
    }

    /// Check constraints and append.
    fn insert(&mut self, values: Vec<DbValue>) -> Result<()> {
        let values: Vec<DbValue> = self
            .columns
            .iter()
            .zip(values)
            .map(|(c, v)| c.coerce(v))
            .collect();
        for (column, value) in self.columns.iter().zip(&values) {
            if value.is_null() && (!column.nullable || column.primary) {
                return Err(crate::Error::statement(format!(
                    "Cannot insert the value NULL into column '{}', table '{}'",
                    column.name, self.name
                )));
            }
        }

        let keys: Vec<usize> = (0..self.columns.len())
            .filter(|&i| self.columns[i].primary)
            .collect();
        if !keys.is_empty() {
            let duplicate = self.rows.iter().any(|row| {
                keys.iter()
                    .all(|&i| loosely_equal(&row[i], &values[i]))
            });
            if duplicate {
                return Err(crate::Error::statement(format!(
                    "Violation of PRIMARY KEY constraint on table '{}'",
                    self.name
                )));
            }
        }

        self.rows.push(values);
        Ok(())
    }
}

/// Shared table storage.
#[derive(Debug, Clone, Default)]
struct Store {
    tables: BTreeMap<String, Table>,
}

impl Store {
    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| invalid_object(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| invalid_object(name))
    }

    fn ensure_absent(&self, name: &str) -> Result<()> {
        if self.tables.contains_key(&name.to_lowercase()) {
            return Err(crate::Error::statement(format!(
                "There is already an object named '{}' in the database",
                name
            )));
        }
        Ok(())
    }

    fn create(&mut self, table: Table) -> Result<()> {
        self.ensure_absent(&table.name)?;
        self.tables.insert(table.name.to_lowercase(), table);
        Ok(())
    }
}

fn invalid_object(name: &str) -> crate::Error {
    crate::Error::statement(format!("Invalid object name '{}'", name))
}

/// Equality that tolerates numbers bound as text.
fn loosely_equal(a: &DbValue, b: &DbValue) -> bool {
    match (a, b) {
        (DbValue::Null, _) | (_, DbValue::Null) => false,
        (DbValue::Int(x), DbValue::Text(s)) | (DbValue::Text(s), DbValue::Int(x)) => {
            s.trim().parse::<i64>().map(|y| y == *x).unwrap_or(false)
        }
        (DbValue::Int(x), DbValue::Float(y)) | (DbValue::Float(y), DbValue::Int(x)) => {
            (*x as f64) == *y
        }
        _ => a == b,
    }
}

/// Per-statement evaluation inputs.
struct Env<'a> {
    params: &'a Params,
    context: &'a str,
    trancount: i64,
}

impl Env<'_> {
    fn eval(&self, expr: &Expr) -> Result<DbValue> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Param(name) => self
                .params
                .get(name)
                .map(|p| p.value.clone())
                .ok_or_else(|| {
                    crate::Error::statement(format!("Must declare the scalar variable '@{}'", name))
                }),
            Expr::TranCount => Ok(DbValue::Int(self.trancount)),
            Expr::ContextInfo => Ok(DbValue::Text(self.context.to_string())),
        }
    }

    fn matches(&self, table: &Table, filter: &Option<Filter>, row: &[DbValue]) -> Result<bool> {
        match filter {
            None => Ok(true),
            Some(filter) => {
                let idx = table.column_index(&filter.column).ok_or_else(|| {
                    crate::Error::statement(format!("Invalid column name '{}'", filter.column))
                })?;
                Ok(loosely_equal(&row[idx], &self.eval(&filter.value)?))
            }
        }
    }
}

/// Run a whole batch against the store.
fn run_batch(store: &mut Store, batch: &str, env: &Env<'_>) -> Result<RawResult> {
    let mut result = RawResult::default();
    for text in statement::split_batch(batch) {
        let parsed = statement::parse(&text)?;
        run_statement(store, parsed, env, &mut result)?;
    }
    Ok(result)
}

fn run_statement(store: &mut Store, stmt: Statement, env: &Env<'_>, out: &mut RawResult) -> Result<()> {
    match stmt {
        Statement::CreateTable { name, columns } => {
            store.create(Table {
                name,
                columns: columns.into_iter().map(column_from_def).collect(),
                rows: Vec::new(),
            })?;
        }
        Statement::DropTable { name, if_exists } => {
            if store.tables.remove(&name.to_lowercase()).is_none() && !if_exists {
                return Err(crate::Error::statement(format!(
                    "Cannot drop the table '{}', because it does not exist",
                    name
                )));
            }
        }
        Statement::Insert {
            table,
            columns,
            values,
        } => {
            let values = values
                .iter()
                .map(|e| env.eval(e))
                .collect::<Result<Vec<_>>>()?;
            let target = store.table_mut(&table)?;
            let row = align_row(target, columns.as_deref(), values)?;
            target.insert(row)?;
        }
        Statement::Delete { table, filter } => {
            let target = store.table_mut(&table)?;
            let mut kept = Vec::with_capacity(target.rows.len());
            for row in std::mem::take(&mut target.rows) {
                if !env.matches(target, &filter, &row)? {
                    kept.push(row);
                }
            }
            target.rows = kept;
        }
        Statement::SelectAll { table, filter } => {
            let source = store.table(&table)?;
            let mut rows = Vec::new();
            for row in &source.rows {
                if env.matches(source, &filter, row)? {
                    rows.push(source.to_row(row));
                }
            }
            out.recordsets.push(rows);
        }
        Statement::SelectCount { table, alias } => {
            let count = store.table(&table)?.rows.len();
            let mut row = Row::new();
            row.insert(alias.unwrap_or_default(), Value::from(count as i64));
            out.recordsets.push(vec![row]);
        }
        Statement::SelectExprs(items) => {
            let mut row = Row::new();
            for (expr, alias) in items {
                row.insert(alias.unwrap_or_default(), Value::from(env.eval(&expr)?));
            }
            out.recordsets.push(vec![row]);
        }
        Statement::Print(expr) => {
            let text = match env.eval(&expr)? {
                DbValue::Text(text) => text,
                other => Value::from(other).to_string(),
            };
            out.messages.push(RawMessage::new(text, PRINT_SEVERITY));
        }
        Statement::RaiseError { message, severity } => {
            out.messages.push(RawMessage::new(message, severity));
        }
    }
    Ok(())
}

fn column_from_def(def: ColumnDef) -> Column {
    Column {
        name: def.name,
        ty: def.ty,
        nullable: def.nullable,
        primary: def.primary,
    }
}

/// Order values to match the table's columns, filling unnamed columns with null.
fn align_row(table: &Table, columns: Option<&[String]>, values: Vec<DbValue>) -> Result<Vec<DbValue>> {
    match columns {
        None => {
            if values.len() != table.columns.len() {
                return Err(crate::Error::statement(format!(
                    "Column name or number of supplied values does not match table definition of '{}'",
                    table.name
                )));
            }
            Ok(values)
        }
        Some(names) => {
            if names.len() != values.len() {
                return Err(crate::Error::statement(
                    "There are fewer columns in the INSERT statement than values specified",
                ));
            }
            let mut row = vec![DbValue::Null; table.columns.len()];
            for (name, value) in names.iter().zip(values) {
                let idx = table.column_index(name).ok_or_else(|| {
                    crate::Error::statement(format!("Invalid column name '{}'", name))
                })?;
                row[idx] = value;
            }
            Ok(row)
        }
    }
}

/// Shared in-memory database; cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    store: Arc<Mutex<Store>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session on this database.
    pub fn session(&self) -> MemorySession {
        MemorySession {
            db: self.clone(),
            open: Mutex::new(None),
        }
    }

    /// Names of the tables currently committed.
    pub async fn table_names(&self) -> Vec<String> {
        let store = self.store.lock().await;
        store.tables.values().map(|t| t.name.clone()).collect()
    }
}

#[async_trait]
impl Connector for MemoryDatabase {
    async fn connect(&self) -> Result<Box<dyn DatabaseSession>> {
        Ok(Box::new(self.session()))
    }
}

struct OpenTransaction {
    id: TransactionId,
    store: OwnedMutexGuard<Store>,
    /// Taken on commit; anything left is restored when the transaction ends.
    snapshot: Option<Store>,
}

impl OpenTransaction {
    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.store = snapshot;
        }
    }
}

// A session dropped mid-transaction rolls back, as a closed connection would.
impl Drop for OpenTransaction {
    fn drop(&mut self) {
        self.restore();
    }
}

/// One connection to a [`MemoryDatabase`].
pub struct MemorySession {
    db: MemoryDatabase,
    open: Mutex<Option<OpenTransaction>>,
}

impl MemorySession {
    /// Run `f` against the transaction's store, or the shared store when none is open.
    async fn with_store<T>(&self, f: impl FnOnce(&mut Store, i64) -> Result<T>) -> Result<T> {
        let mut open = self.open.lock().await;
        match open.as_mut() {
            Some(tx) => f(&mut *tx.store, 1),
            None => {
                let mut store = self.db.store.lock().await;
                f(&mut *store, 0)
            }
        }
    }

    fn take_open(open: &mut Option<OpenTransaction>, tx: TransactionId) -> Result<OpenTransaction> {
        match open.take() {
            Some(current) if current.id == tx => Ok(current),
            Some(current) => {
                let id = current.id;
                *open = Some(current);
                Err(crate::Error::Transaction(format!(
                    "Transaction {} is not the open transaction {}",
                    tx, id
                )))
            }
            None => Err(crate::Error::Transaction(format!(
                "Transaction {} is not open",
                tx
            ))),
        }
    }
}

#[async_trait]
impl DatabaseSession for MemorySession {
    async fn execute(&self, context: &str, statement: &str, params: &Params) -> Result<RawResult> {
        self.with_store(|store, trancount| {
            let env = Env {
                params,
                context,
                trancount,
            };
            run_batch(store, statement, &env)
        })
        .await
    }

    async fn bulk_create(&self, _context: &str, table: &TableSpec) -> Result<Vec<RawMessage>> {
        table.validate()?;
        self.with_store(|store, _| {
            let columns = table
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    ty: Some(c.ty),
                    nullable: c.options.nullable,
                    primary: c.options.primary,
                })
                .collect();
            store.ensure_absent(&table.name)?;
            let mut staged = Table {
                name: table.name.clone(),
                columns,
                rows: Vec::new(),
            };
            for row in &table.data {
                staged.insert(row.clone())?;
            }
            store.create(staged)?;
            Ok(Vec::new())
        })
        .await
    }

    async fn bulk_insert(&self, _context: &str, table: &TableSpec) -> Result<Vec<RawMessage>> {
        table.validate()?;
        self.with_store(|store, _| {
            let mut staged = store.table(&table.name)?.clone();
            let names: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
            for row in &table.data {
                let aligned = align_row(&staged, Some(&names), row.clone())?;
                staged.insert(aligned)?;
            }
            *store.table_mut(&table.name)? = staged;
            Ok(Vec::new())
        })
        .await
    }

    async fn begin_transaction(&self) -> Result<TransactionId> {
        let mut open = self.open.lock().await;
        if let Some(current) = open.as_ref() {
            return Err(crate::Error::Transaction(format!(
                "Transaction {} is already open on this session",
                current.id
            )));
        }
        let store = self.db.store.clone().lock_owned().await;
        let snapshot = Some(store.clone());
        let id = TransactionId::new();
        *open = Some(OpenTransaction {
            id,
            store,
            snapshot,
        });
        Ok(id)
    }

    async fn commit(&self, tx: TransactionId) -> Result<()> {
        let mut open = self.open.lock().await;
        let mut current = Self::take_open(&mut *open, tx)?;
        current.snapshot = None;
        Ok(())
    }

    async fn rollback(&self, tx: TransactionId) -> Result<()> {
        let mut open = self.open.lock().await;
        let mut current = Self::take_open(&mut *open, tx)?;
        current.restore();
        Ok(())
    }
}
