//! Orchestration core.

pub(crate) mod aggregator;
pub mod context;
pub mod db;
pub mod diagnostics;
pub mod normalizer;
pub mod plan_file;
pub mod scheduler;
pub mod scripts;
pub mod transaction;

pub use context::UnitContext;
pub use db::Db;
pub use scheduler::{JoinPolicy, PlanFailure, PlanOutput};
pub use transaction::TransactionHandle;
