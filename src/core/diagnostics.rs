//! Diagnostic message classification.
//!
//! Servers report informational output, warnings and errors as messages with
//! a numeric severity. Each dialect places the cut-offs differently:
//! - at or above the error boundary: the statement failed
//! - at or below the notice boundary: NOTICE
//! - anything in between: WARNING

use crate::models::message::{Message, RawMessage, Severity, UnitStats};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric message levels used by the postgres preset.
pub mod postgres {
    pub const DEBUG: u8 = 10;
    pub const LOG: u8 = 15;
    pub const INFO: u8 = 17;
    pub const NOTICE: u8 = 18;
    pub const WARNING: u8 = 19;
    pub const ERROR: u8 = 21;
}

/// Server dialect whose severity scale the messages use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Mssql,
    Postgres,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Mssql => write!(f, "mssql"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}

/// Severity cut-offs for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundaries {
    /// Messages at or above this severity fail the statement.
    pub error: u8,
    /// Messages at or below this severity are notices.
    pub notice: u8,
}

impl Boundaries {
    pub fn new(error: u8, notice: u8) -> Self {
        Self { error, notice }
    }

    /// Preset for a dialect.
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            // PRINT is 0, RAISERROR 1..=10 is informational, 11+ aborts
            Dialect::Mssql => Self::new(11, 0),
            Dialect::Postgres => Self::new(postgres::ERROR, postgres::NOTICE),
        }
    }

    pub fn severity_of(&self, severity: u8) -> Option<Severity> {
        if severity >= self.error {
            None
        } else if severity <= self.notice {
            Some(Severity::Notice)
        } else {
            Some(Severity::Warning)
        }
    }

    /// Split messages into notices and warnings, or fail on the first error.
    ///
    /// Emission order is kept within each bucket.
    pub fn classify(&self, messages: Vec<RawMessage>) -> Result<UnitStats> {
        let mut stats = UnitStats::new();
        for raw in messages {
            match self.severity_of(raw.severity) {
                Some(severity) => stats.push(Message {
                    message: raw.text,
                    severity,
                }),
                None => {
                    tracing::debug!("Message with severity {} fails statement", raw.severity);
                    return Err(crate::Error::Statement {
                        message: raw.text,
                        severity: Some(raw.severity),
                    });
                }
            }
        }
        Ok(stats)
    }
}

impl Default for Boundaries {
    fn default() -> Self {
        Self::for_dialect(Dialect::default())
    }
}
