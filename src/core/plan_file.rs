//! JSON plan files.
//!
//! A plan file describes a task spec whose units are single statements:
//! - an object with a `"sql"` key is a statement unit
//! - any other object is a named mapping
//! - an array is a list

use crate::models::outcome::UnitOutput;
use crate::models::plan::TaskSpec;
use crate::models::value::Params;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Which statement primitive a unit calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Scalar,
    Row,
    #[default]
    Recordset,
    MultiRecordset,
    Command,
}

/// A statement unit as written in a plan file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementUnit {
    pub sql: String,
    #[serde(default)]
    pub kind: StatementKind,
    #[serde(default)]
    pub params: Params,
    /// Connection context; the database default when absent.
    #[serde(default)]
    pub context: Option<String>,
}

impl StatementUnit {
    /// Build a unit running this statement in the unit's context.
    pub fn into_spec(self) -> TaskSpec {
        let unit = Arc::new(self);
        TaskSpec::unit(move |ctx| {
            let unit = unit.clone();
            async move {
                let db = ctx.db();
                let context = unit.context.as_deref().unwrap_or_else(|| db.context());
                let tx = ctx.transaction();
                let (sql, params) = (unit.sql.as_str(), &unit.params);
                let output: UnitOutput = match unit.kind {
                    StatementKind::Scalar => db.scalar(context, sql, params, tx).await?.into(),
                    StatementKind::Row => db.row(context, sql, params, tx).await?.into(),
                    StatementKind::Recordset => db.recordset(context, sql, params, tx).await?.into(),
                    StatementKind::MultiRecordset => {
                        db.multi_recordset(context, sql, params, tx).await?.into()
                    }
                    StatementKind::Command => db.command(context, sql, params, tx).await?.into(),
                };
                Ok::<_, crate::Error>(output)
            }
        })
    }
}

/// Convert a parsed plan document into a task spec.
pub fn spec_from_value(value: Value) -> Result<TaskSpec> {
    spec_at(value, "plan")
}

fn spec_at(value: Value, path: &str) -> Result<TaskSpec> {
    match value {
        Value::Object(map) if map.contains_key("sql") => {
            let unit: StatementUnit = serde_json::from_value(Value::Object(map)).map_err(|e| {
                crate::Error::MalformedSpec(format!("{}: invalid statement unit: {}", path, e))
            })?;
            Ok(unit.into_spec())
        }
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (name, child) in map {
                let child_path = format!("{}.{}", path, name);
                entries.push((name, spec_at(child, &child_path)?));
            }
            Ok(TaskSpec::Map(entries))
        }
        Value::Array(items) => {
            let items = items
                .into_iter()
                .enumerate()
                .map(|(i, child)| spec_at(child, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()?;
            Ok(TaskSpec::List(items))
        }
        other => Err(crate::Error::MalformedSpec(format!(
            "{}: expected an object or array, found {}",
            path, other
        ))),
    }
}

/// Load a plan file.
pub fn load_plan(path: &Path) -> Result<TaskSpec> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    tracing::debug!("Loaded plan file {}", path.display());
    spec_from_value(value)
}
