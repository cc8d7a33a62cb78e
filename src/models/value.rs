//! Parameter and value model.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A result row: column name to value, in column order.
pub type Row = serde_json::Map<String, Value>;

/// Declared type of a bound parameter or table column.
///
/// The core never coerces values; the type travels with the binding so the
/// session can hand it to its driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DbType {
    BigInt,
    Int,
    Bit,
    Boolean,
    Decimal,
    Float,
    VarChar(Option<u32>),
    NVarChar(Option<u32>),
    Text,
    Date,
    Time,
    DateTime(Option<u8>),
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::BigInt => write!(f, "bigint"),
            DbType::Int => write!(f, "int"),
            DbType::Bit => write!(f, "bit"),
            DbType::Boolean => write!(f, "boolean"),
            DbType::Decimal => write!(f, "decimal"),
            DbType::Float => write!(f, "float"),
            DbType::VarChar(Some(len)) => write!(f, "varchar({})", len),
            DbType::VarChar(None) => write!(f, "varchar(max)"),
            DbType::NVarChar(Some(len)) => write!(f, "nvarchar({})", len),
            DbType::NVarChar(None) => write!(f, "nvarchar(max)"),
            DbType::Text => write!(f, "text"),
            DbType::Date => write!(f, "date"),
            DbType::Time => write!(f, "time"),
            DbType::DateTime(Some(p)) => write!(f, "datetime({})", p),
            DbType::DateTime(None) => write!(f, "datetime"),
        }
    }
}

impl TryFrom<String> for DbType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        DbType::parse(&value).ok_or_else(|| format!("unknown type: {}", value))
    }
}

impl From<DbType> for String {
    fn from(ty: DbType) -> Self {
        ty.to_string()
    }
}

impl DbType {
    /// Parse a type name such as `bigint`, `varchar(64)` or `datetime(7)`.
    pub fn parse(name: &str) -> Option<DbType> {
        let name = name.trim().to_lowercase();
        let (base, arg) = match name.find('(') {
            Some(open) => {
                let inner = name[open + 1..].trim_end_matches(')').trim();
                (name[..open].trim(), Some(inner.to_string()))
            }
            None => (name.as_str(), None),
        };
        let len = arg.as_deref().and_then(|a| a.parse::<u32>().ok());

        let ty = match base {
            "bigint" => DbType::BigInt,
            "int" | "integer" => DbType::Int,
            "bit" => DbType::Bit,
            "bool" | "boolean" => DbType::Boolean,
            "decimal" | "numeric" => DbType::Decimal,
            "float" | "real" | "double" => DbType::Float,
            "varchar" | "char" => DbType::VarChar(len),
            "nvarchar" | "nchar" => DbType::NVarChar(len),
            "text" => DbType::Text,
            "date" => DbType::Date,
            "time" => DbType::Time,
            "datetime" | "datetime2" | "timestamp" => DbType::DateTime(len.map(|p| p as u8)),
            _ => return None,
        };
        Some(ty)
    }
}

/// A bound parameter or cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DbValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }
}

impl From<DbValue> for Value {
    fn from(value: DbValue) -> Self {
        match value {
            DbValue::Null => Value::Null,
            DbValue::Bool(b) => Value::Bool(b),
            DbValue::Int(i) => Value::from(i),
            DbValue::Float(f) => Value::from(f),
            DbValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            DbValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
            DbValue::Text(s) => Value::String(s),
        }
    }
}

impl From<&str> for DbValue {
    fn from(value: &str) -> Self {
        DbValue::Text(value.to_string())
    }
}

impl From<String> for DbValue {
    fn from(value: String) -> Self {
        DbValue::Text(value)
    }
}

impl From<i64> for DbValue {
    fn from(value: i64) -> Self {
        DbValue::Int(value)
    }
}

impl From<i32> for DbValue {
    fn from(value: i32) -> Self {
        DbValue::Int(value as i64)
    }
}

impl From<f64> for DbValue {
    fn from(value: f64) -> Self {
        DbValue::Float(value)
    }
}

impl From<bool> for DbValue {
    fn from(value: bool) -> Self {
        DbValue::Bool(value)
    }
}

impl From<NaiveDate> for DbValue {
    fn from(value: NaiveDate) -> Self {
        DbValue::Date(value)
    }
}

impl From<NaiveDateTime> for DbValue {
    fn from(value: NaiveDateTime) -> Self {
        DbValue::DateTime(value)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DbValue::Null)
    }
}

/// A single typed parameter binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name, referenced as `@name` in statements.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: DbType,
    /// Bound value.
    pub value: DbValue,
}

/// Ordered parameter bindings for one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    bindings: Vec<Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a parameter, replacing an earlier binding of the same name.
    pub fn bind(mut self, name: impl Into<String>, ty: DbType, value: impl Into<DbValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.bindings.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&name)) {
            Some(existing) => {
                existing.ty = ty;
                existing.value = value;
            }
            None => self.bindings.push(Param { name, ty, value }),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.bindings.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_db_type() {
        assert_eq!(DbType::parse("BigInt"), Some(DbType::BigInt));
        assert_eq!(DbType::parse("varchar(64)"), Some(DbType::VarChar(Some(64))));
        assert_eq!(DbType::parse("DateTime(7)"), Some(DbType::DateTime(Some(7))));
        assert_eq!(DbType::parse("geometry"), None);
    }

    #[test]
    fn test_bind_replaces_same_name() {
        let params = Params::new()
            .bind("c_id", DbType::BigInt, 1)
            .bind("C_ID", DbType::BigInt, 2);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("c_id").map(|p| &p.value), Some(&DbValue::Int(2)));
    }

    #[test]
    fn test_date_value_to_json() {
        let date = NaiveDate::from_ymd_opt(2018, 12, 3).unwrap();
        assert_eq!(Value::from(DbValue::Date(date)), Value::String("2018-12-03".into()));
    }
}
