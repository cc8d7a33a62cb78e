//! Diagnostic message model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A message as emitted by the server, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Message text.
    pub text: String,
    /// Numeric severity in the session dialect's scale.
    pub severity: u8,
}

impl RawMessage {
    pub fn new(text: impl Into<String>, severity: u8) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }
}

/// Classified severity of a diagnostic that did not fail the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Notice,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Notice => write!(f, "NOTICE"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// A classified diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
    pub severity: Severity,
}

/// Diagnostics collected for one unit, in server emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub notices: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl UnitStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty() && self.warnings.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        match message.severity {
            Severity::Notice => self.notices.push(message),
            Severity::Warning => self.warnings.push(message),
        }
    }

    /// Append another statement's diagnostics after this one's.
    pub fn extend(&mut self, other: UnitStats) {
        self.notices.extend(other.notices);
        self.warnings.extend(other.warnings);
    }
}
