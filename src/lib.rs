//! dbtasks
//!
//! Runs staged plans of database work: units of a stage run concurrently,
//! stages run in order, optionally all inside one transaction. Results and
//! classified server messages come back in trees shaped like the plan.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod session;

pub use crate::core::{Db, PlanFailure, PlanOutput, TransactionHandle, UnitContext};
pub use error::{Error, Result};
pub use models::config::Config;
pub use models::plan::{TaskSpec, Unit};
