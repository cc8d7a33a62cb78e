//! Statement and unit outcomes.

use super::message::UnitStats;
use serde::Serialize;
use serde_json::Value;

/// A classified statement result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub stats: UnitStats,
}

impl<T> Outcome<T> {
    pub fn new(value: T, stats: UnitStats) -> Self {
        Self { value, stats }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            stats: self.stats,
        }
    }
}

/// What a unit hands back to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitOutput {
    pub result: Value,
    pub stats: UnitStats,
}

impl UnitOutput {
    /// A result with no diagnostics.
    pub fn new(result: impl Into<Value>) -> Self {
        Self {
            result: result.into(),
            stats: UnitStats::default(),
        }
    }

    pub fn with_stats(result: impl Into<Value>, stats: UnitStats) -> Self {
        Self {
            result: result.into(),
            stats,
        }
    }
}

impl<T: Into<Value>> From<Outcome<T>> for UnitOutput {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            result: outcome.value.into(),
            stats: outcome.stats,
        }
    }
}
