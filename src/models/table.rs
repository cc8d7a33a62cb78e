//! Bulk load table descriptor.

use super::value::{DbType, DbValue};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Column flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOptions {
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary: bool,
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: DbType,
    #[serde(default)]
    pub options: ColumnOptions,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: DbType) -> Self {
        Self {
            name: name.into(),
            ty,
            options: ColumnOptions::default(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.options.nullable = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.options.primary = true;
        self
    }
}

/// Table name, ordered columns and rows aligned to those columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub data: Vec<Vec<DbValue>>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
            data: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<DbValue>>) -> Self {
        self.data = rows;
        self
    }

    /// Check that every row is aligned to the column list.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(crate::Error::statement(format!(
                "Table {} has no columns",
                self.name
            )));
        }
        for (i, row) in self.data.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(crate::Error::statement(format!(
                    "Row {} of {} has {} values, expected {}",
                    i,
                    self.name,
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_misaligned_row() {
        let table = TableSpec::new(
            "t",
            vec![
                ColumnSpec::new("a", DbType::Int).primary(),
                ColumnSpec::new("b", DbType::Text).nullable(),
            ],
        )
        .with_rows(vec![vec![DbValue::Int(1)]]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_deserialize_table_spec() {
        let json = r#"{
            "name": "c",
            "columns": [
                { "name": "c_id", "type": "bigint", "options": { "primary": true } },
                { "name": "c_desc", "type": "varchar(64)", "options": { "nullable": true } }
            ],
            "data": [[1, null], [2, "Singer"]]
        }"#;
        let table: TableSpec = serde_json::from_str(json).unwrap();
        assert!(table.columns[0].options.primary);
        assert_eq!(table.columns[1].ty, DbType::VarChar(Some(64)));
        assert_eq!(table.data[1][1], DbValue::Text("Singer".into()));
        assert!(table.validate().is_ok());
    }
}
