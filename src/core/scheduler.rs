//! Stage scheduler.
//!
//! Runs a normalized plan one stage at a time. Units of a stage run
//! concurrently and the next stage starts only once the current one has
//! settled. Each unit receives the result tree of the stage before it.

use super::aggregator::{assemble, StageOutputs};
use super::context::UnitContext;
use super::db::Db;
use super::transaction::TransactionHandle;
use crate::models::message::UnitStats;
use crate::models::plan::Plan;
use crate::models::tree::{StageTree, Tree};
use crate::Error;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// How a stage reacts to a failing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Let every unit settle; report the earliest-declared failure.
    WaitAll,
    /// Abandon the rest of the stage on the first failure.
    StopOnFailure,
}

/// Trees of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutput {
    pub results: Tree<Value>,
    pub stats: Tree<UnitStats>,
}

/// A failed run with whatever completed before it stopped.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PlanFailure {
    #[source]
    pub error: Error,
    pub results: Tree<Value>,
    pub stats: Tree<UnitStats>,
}

impl PlanFailure {
    /// A failure before any unit ran.
    pub fn empty(error: Error) -> Self {
        Self {
            error,
            results: Tree::Empty,
            stats: Tree::Empty,
        }
    }

    pub fn map_error(self, f: impl FnOnce(Error) -> Error) -> Self {
        Self {
            error: f(self.error),
            results: self.results,
            stats: self.stats,
        }
    }
}

/// Run every stage of `plan` in order.
pub(crate) async fn run_stages(
    db: &Db,
    plan: &Plan,
    transaction: Option<&TransactionHandle>,
    policy: JoinPolicy,
) -> std::result::Result<PlanOutput, PlanFailure> {
    let mut result_stages: Vec<StageTree<Value>> = Vec::with_capacity(plan.stages().len());
    let mut stat_stages: Vec<StageTree<UnitStats>> = Vec::with_capacity(plan.stages().len());
    let mut prior: Option<Arc<StageTree<Value>>> = None;
    let mut failure: Option<Error> = None;

    for (index, stage) in plan.stages().iter().enumerate() {
        tracing::debug!("Starting stage {} ({} unit(s))", index, stage.len());

        let mut outputs = StageOutputs::new(stage);
        let mut pending: FuturesUnordered<_> = stage
            .units()
            .into_iter()
            .enumerate()
            .map(|(position, (key, unit))| {
                let ctx = UnitContext::new(db.clone(), transaction.cloned(), prior.clone(), key);
                let fut = unit.call(ctx);
                async move { (position, fut.await) }
            })
            .collect();

        let mut failed: Vec<(usize, Error)> = Vec::new();
        while let Some((position, outcome)) = pending.next().await {
            match outcome {
                Ok(output) => outputs.record(position, output),
                Err(err) => {
                    let key = outputs.key(position).map(ToString::to_string).unwrap_or_default();
                    tracing::warn!("Unit '{}' of stage {} failed: {}", key, index, err);
                    failed.push((position, err));
                    if policy == JoinPolicy::StopOnFailure {
                        break;
                    }
                }
            }
        }
        if !pending.is_empty() {
            tracing::debug!("Abandoning {} unit(s) of stage {}", pending.len(), index);
        }
        drop(pending);

        let (results, stats) = outputs.finish();
        stat_stages.push(stats);

        if let Some((_, err)) = failed.into_iter().min_by_key(|(position, _)| *position) {
            result_stages.push(results);
            failure = Some(err);
            break;
        }

        tracing::debug!("Finished stage {}", index);
        prior = Some(Arc::new(results.clone()));
        result_stages.push(results);
    }

    let results = assemble(plan, result_stages);
    let stats = assemble(plan, stat_stages);
    match failure {
        Some(error) => Err(PlanFailure {
            error,
            results,
            stats,
        }),
        None => Ok(PlanOutput { results, stats }),
    }
}
