//! Statement recognizer for the in-memory session.
//!
//! Understands a small fixed vocabulary, enough to exercise the
//! orchestration core without a server:
//! - `CREATE TABLE t (col [type] [NOT NULL] [PRIMARY KEY], ...)`
//! - `DROP TABLE [IF EXISTS] t`
//! - `INSERT INTO t [(cols)] VALUES (...)`
//! - `DELETE FROM t [WHERE col = value]`
//! - `SELECT * FROM t [WHERE col = value]`
//! - `SELECT COUNT(*) [[AS] alias] FROM t`
//! - `SELECT expr [[AS] alias], ...` over literals, `@param`,
//!   `@@TRANCOUNT` and `CONTEXT_INFO()`
//! - `PRINT 'text'` and `RAISERROR('text', severity[, state])`

use crate::models::value::{DbType, DbValue};
use crate::Result;

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Expr>,
    },
    Delete {
        table: String,
        filter: Option<Filter>,
    },
    SelectAll {
        table: String,
        filter: Option<Filter>,
    },
    SelectCount {
        table: String,
        alias: Option<String>,
    },
    SelectExprs(Vec<(Expr, Option<String>)>),
    Print(Expr),
    RaiseError {
        message: String,
        severity: u8,
    },
}

/// Column definition in `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnDef {
    pub name: String,
    pub ty: Option<DbType>,
    pub nullable: bool,
    pub primary: bool,
}

/// `WHERE col = value`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(DbValue),
    Param(String),
    TranCount,
    ContextInfo,
}

/// Split a batch into statements on top-level `;`.
pub(crate) fn split_batch(batch: &str) -> Vec<String> {
    split_top_level(batch, ';')
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split on `sep` outside quotes and parentheses.
fn split_top_level(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut depth = 0usize;

    for c in input.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            '(' if !in_quote => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == sep && !in_quote && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn syntax_error(statement: &str) -> crate::Error {
    let near = statement.split_whitespace().next().unwrap_or(statement);
    crate::Error::statement(format!("Incorrect syntax near '{}'", near))
}

/// Parse one statement.
pub(crate) fn parse(statement: &str) -> Result<Statement> {
    let statement = statement.trim();
    parse_statement(statement).ok_or_else(|| syntax_error(statement))
}

fn parse_statement(s: &str) -> Option<Statement> {
    let re_create = regex::Regex::new(r"(?is)^create\s+table\s+([#\w\.]+)\s*\((.*)\)$").ok()?;
    if let Some(caps) = re_create.captures(s) {
        let columns = split_top_level(caps.get(2)?.as_str(), ',')
            .iter()
            .map(|c| parse_column_def(c))
            .collect::<Option<Vec<_>>>()?;
        return Some(Statement::CreateTable {
            name: caps.get(1)?.as_str().to_string(),
            columns,
        });
    }

    let re_drop = regex::Regex::new(r"(?i)^drop\s+table\s+(if\s+exists\s+)?([#\w\.]+)$").ok()?;
    if let Some(caps) = re_drop.captures(s) {
        return Some(Statement::DropTable {
            name: caps.get(2)?.as_str().to_string(),
            if_exists: caps.get(1).is_some(),
        });
    }

    let re_insert = regex::Regex::new(
        r"(?is)^insert\s+into\s+([#\w\.]+)\s*(?:\(([^)]*)\))?\s*values\s*\((.*)\)$",
    )
    .ok()?;
    if let Some(caps) = re_insert.captures(s) {
        let columns = caps.get(2).map(|m| {
            m.as_str()
                .split(',')
                .map(|c| c.trim().to_string())
                .collect::<Vec<_>>()
        });
        let values = split_top_level(caps.get(3)?.as_str(), ',')
            .iter()
            .map(|v| parse_expr(v.trim()))
            .collect::<Option<Vec<_>>>()?;
        return Some(Statement::Insert {
            table: caps.get(1)?.as_str().to_string(),
            columns,
            values,
        });
    }

    let re_delete =
        regex::Regex::new(r"(?is)^delete\s+from\s+([#\w\.]+)(?:\s+where\s+(\w+)\s*=\s*(.+))?$").ok()?;
    if let Some(caps) = re_delete.captures(s) {
        return Some(Statement::Delete {
            table: caps.get(1)?.as_str().to_string(),
            filter: parse_filter(caps.get(2), caps.get(3))?,
        });
    }

    let re_select_all = regex::Regex::new(
        r"(?is)^select\s+\*\s+from\s+([#\w\.]+)(?:\s+where\s+(\w+)\s*=\s*(.+))?$",
    )
    .ok()?;
    if let Some(caps) = re_select_all.captures(s) {
        return Some(Statement::SelectAll {
            table: caps.get(1)?.as_str().to_string(),
            filter: parse_filter(caps.get(2), caps.get(3))?,
        });
    }

    let re_count = regex::Regex::new(
        r"(?is)^select\s+count\(\s*\*\s*\)(?:\s+(?:as\s+)?(\w+))?\s+from\s+([#\w\.]+)$",
    )
    .ok()?;
    if let Some(caps) = re_count.captures(s) {
        return Some(Statement::SelectCount {
            table: caps.get(2)?.as_str().to_string(),
            alias: caps.get(1).map(|m| m.as_str().to_string()),
        });
    }

    let re_select = regex::Regex::new(r"(?is)^select\s+(.+)$").ok()?;
    if let Some(caps) = re_select.captures(s) {
        let items = split_top_level(caps.get(1)?.as_str(), ',')
            .iter()
            .map(|item| parse_select_item(item.trim()))
            .collect::<Option<Vec<_>>>()?;
        return Some(Statement::SelectExprs(items));
    }

    let re_print = regex::Regex::new(r"(?is)^print\s+(.+)$").ok()?;
    if let Some(caps) = re_print.captures(s) {
        return Some(Statement::Print(parse_expr(caps.get(1)?.as_str().trim())?));
    }

    let re_raise = regex::Regex::new(
        r"(?is)^raiserror\s*\(\s*('(?:[^']|'')*')\s*,\s*(\d+)\s*(?:,\s*\d+\s*)?\)$",
    )
    .ok()?;
    if let Some(caps) = re_raise.captures(s) {
        let message = match parse_literal(caps.get(1)?.as_str())? {
            DbValue::Text(text) => text,
            _ => return None,
        };
        return Some(Statement::RaiseError {
            message,
            severity: caps.get(2)?.as_str().parse().ok()?,
        });
    }

    None
}

/// `None` means the filter text did not parse; `Some(None)` means no filter.
fn parse_filter(
    column: Option<regex::Match<'_>>,
    value: Option<regex::Match<'_>>,
) -> Option<Option<Filter>> {
    match (column, value) {
        (Some(column), Some(value)) => Some(Some(Filter {
            column: column.as_str().to_string(),
            value: parse_expr(value.as_str().trim())?,
        })),
        _ => Some(None),
    }
}

fn parse_column_def(def: &str) -> Option<ColumnDef> {
    // Peel constraint flags off the end, then read `name [type]`.
    let re_flag = regex::Regex::new(r"(?i)\s*\b(not\s+null|null|primary\s+key)\s*$").ok()?;
    let mut body = def.trim().to_string();
    let mut not_null = false;
    let mut primary = false;
    while let Some(m) = re_flag.find(&body) {
        let flag = m.as_str().trim().to_lowercase();
        if flag.starts_with("primary") {
            primary = true;
        } else if flag.starts_with("not") {
            not_null = true;
        }
        body.truncate(m.start());
    }

    let re = regex::Regex::new(r"(?s)^(\w+)(?:\s+(.+))?$").ok()?;
    let caps = re.captures(body.trim())?;
    let ty = match caps.get(2) {
        Some(m) => Some(DbType::parse(m.as_str())?),
        None => None,
    };

    Some(ColumnDef {
        name: caps.get(1)?.as_str().to_string(),
        ty,
        nullable: !primary && !not_null,
        primary,
    })
}

fn parse_select_item(item: &str) -> Option<(Expr, Option<String>)> {
    // The expression is a single token; whatever follows is the alias.
    let (expr_text, rest) = if item.starts_with('\'') {
        let end = closing_quote(item)?;
        item.split_at(end + 1)
    } else {
        let lower = item.to_lowercase();
        if lower.starts_with("context_info()") {
            item.split_at("context_info()".len())
        } else {
            match item.find(char::is_whitespace) {
                Some(pos) => item.split_at(pos),
                None => (item, ""),
            }
        }
    };

    let expr = parse_expr(expr_text.trim())?;
    let re_alias = regex::Regex::new(r"(?i)^(?:as\s+)?(\w+)$").ok()?;
    let rest = rest.trim();
    let alias = if rest.is_empty() {
        None
    } else {
        Some(re_alias.captures(rest)?.get(1)?.as_str().to_string())
    };
    Some((expr, alias))
}

/// Byte index of the quote closing the literal that starts at index 0.
fn closing_quote(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn parse_expr(text: &str) -> Option<Expr> {
    let lower = text.to_lowercase();
    if lower == "@@trancount" {
        return Some(Expr::TranCount);
    }
    if lower == "context_info()" {
        return Some(Expr::ContextInfo);
    }
    if let Some(name) = text.strip_prefix('@') {
        if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Some(Expr::Param(name.to_string()));
        }
        return None;
    }
    parse_literal(text).map(Expr::Literal)
}

fn parse_literal(text: &str) -> Option<DbValue> {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Some(DbValue::Text(text[1..text.len() - 1].replace("''", "'")));
    }
    match text.to_lowercase().as_str() {
        "null" => return Some(DbValue::Null),
        "true" => return Some(DbValue::Bool(true)),
        "false" => return Some(DbValue::Bool(false)),
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(DbValue::Int(i));
    }
    text.parse::<f64>().ok().map(DbValue::Float)
}
