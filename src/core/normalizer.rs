//! Task spec normalization.
//!
//! Resolves the accepted spec forms into an ordered list of stages:
//! - a single unit: one positional stage of one unit
//! - a list of units: one positional stage
//! - a mapping of units: one named stage
//! - a list of lists/mappings: one stage per element
//!
//! Everything is checked before any unit runs.

use crate::models::plan::{Plan, PlanShape, Stage, TaskSpec, Unit};
use crate::Result;
use std::collections::HashSet;

/// Normalize a spec into a plan, or fail with `MalformedSpec`.
pub fn normalize(spec: TaskSpec) -> Result<Plan> {
    let mut errors = Vec::new();

    let plan = match spec {
        TaskSpec::Unit(unit) => Plan::new(PlanShape::Unit, vec![Stage::Positional(vec![unit])]),
        TaskSpec::Map(entries) => {
            let stage = named_stage(entries, "plan", &mut errors);
            Plan::new(PlanShape::Stage, vec![stage])
        }
        TaskSpec::List(items) => {
            let units = items.iter().filter(|i| matches!(i, TaskSpec::Unit(_))).count();
            if units == items.len() {
                let stage = positional_stage(items, "plan", &mut errors);
                Plan::new(PlanShape::Stage, vec![stage])
            } else if units == 0 {
                let stages = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| stage_of(item, &format!("stage {}", i), &mut errors))
                    .collect();
                Plan::new(PlanShape::Staged, stages)
            } else {
                errors.push("plan mixes units and stages in one list".to_string());
                Plan::new(PlanShape::Staged, Vec::new())
            }
        }
    };

    if !errors.is_empty() {
        tracing::warn!("Rejected task spec: {} problem(s)", errors.len());
        return Err(crate::Error::MalformedSpec(errors.join("; ")));
    }

    tracing::debug!(
        "Normalized plan: {:?}, {} stage(s), {} unit(s)",
        plan.shape(),
        plan.stages().len(),
        plan.unit_count()
    );
    Ok(plan)
}

fn stage_of(spec: TaskSpec, path: &str, errors: &mut Vec<String>) -> Stage {
    match spec {
        TaskSpec::Map(entries) => named_stage(entries, path, errors),
        TaskSpec::List(items) => positional_stage(items, path, errors),
        TaskSpec::Unit(_) => {
            errors.push(format!("{} is a unit, expected a list or mapping", path));
            Stage::Positional(Vec::new())
        }
    }
}

fn named_stage(entries: Vec<(String, TaskSpec)>, path: &str, errors: &mut Vec<String>) -> Stage {
    let mut seen = HashSet::new();
    let mut units = Vec::with_capacity(entries.len());

    for (name, spec) in entries {
        if !seen.insert(name.clone()) {
            errors.push(format!("{} declares '{}' more than once", path, name));
            continue;
        }
        match as_unit(spec) {
            Some(unit) => units.push((name, unit)),
            None => errors.push(format!("{} entry '{}' is not a unit", path, name)),
        }
    }
    Stage::Named(units)
}

fn positional_stage(items: Vec<TaskSpec>, path: &str, errors: &mut Vec<String>) -> Stage {
    let mut units = Vec::with_capacity(items.len());
    for (i, spec) in items.into_iter().enumerate() {
        match as_unit(spec) {
            Some(unit) => units.push(unit),
            None => errors.push(format!("{} element {} is not a unit", path, i)),
        }
    }
    Stage::Positional(units)
}

fn as_unit(spec: TaskSpec) -> Option<Unit> {
    match spec {
        TaskSpec::Unit(unit) => Some(unit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::outcome::UnitOutput;
    use crate::models::tree::StageKind;

    fn unit() -> TaskSpec {
        TaskSpec::unit(|_ctx| async { Ok(UnitOutput::new(1)) })
    }

    #[test]
    fn test_single_unit() {
        let plan = normalize(unit()).unwrap();
        assert_eq!(plan.shape(), PlanShape::Unit);
        assert_eq!(plan.stages().len(), 1);
        assert_eq!(plan.unit_count(), 1);
    }

    #[test]
    fn test_mapping_is_one_named_stage() {
        let plan = normalize(TaskSpec::map([("a", unit()), ("b", unit())])).unwrap();
        assert_eq!(plan.shape(), PlanShape::Stage);
        assert_eq!(plan.stages()[0].kind(), StageKind::Named);
        assert_eq!(plan.stages()[0].len(), 2);
    }

    #[test]
    fn test_list_of_stages() {
        let spec = TaskSpec::list([
            TaskSpec::list([unit(), unit()]),
            TaskSpec::map([("c", unit())]),
        ]);
        let plan = normalize(spec).unwrap();
        assert_eq!(plan.shape(), PlanShape::Staged);
        let kinds: Vec<_> = plan.stages().iter().map(Stage::kind).collect();
        assert_eq!(kinds, vec![StageKind::Positional, StageKind::Named]);
    }

    #[test]
    fn test_empty_list_is_empty_stage() {
        let plan = normalize(TaskSpec::list(Vec::<TaskSpec>::new())).unwrap();
        assert_eq!(plan.shape(), PlanShape::Stage);
        assert_eq!(plan.unit_count(), 0);
    }

    #[test]
    fn test_mixed_list_is_malformed() {
        let spec = TaskSpec::list([unit(), TaskSpec::list([unit()])]);
        assert!(matches!(normalize(spec), Err(crate::Error::MalformedSpec(_))));
    }

    #[test]
    fn test_nested_mapping_value_is_malformed() {
        let spec = TaskSpec::map([("a", TaskSpec::list([unit()]))]);
        assert!(matches!(normalize(spec), Err(crate::Error::MalformedSpec(_))));
    }

    #[test]
    fn test_three_levels_is_malformed() {
        let spec = TaskSpec::list([TaskSpec::list([TaskSpec::list([unit()])])]);
        assert!(matches!(normalize(spec), Err(crate::Error::MalformedSpec(_))));
    }

    #[test]
    fn test_duplicate_name_is_malformed() {
        let spec = TaskSpec::map([("a", unit()), ("a", unit())]);
        match normalize(spec) {
            Err(crate::Error::MalformedSpec(msg)) => assert!(msg.contains("'a'")),
            other => panic!("expected malformed spec, got {:?}", other),
        }
    }

    #[test]
    fn test_renormalizing_canonical_plan_is_idempotent() {
        let spec = TaskSpec::list([
            TaskSpec::map([("a", unit()), ("b", unit())]),
            TaskSpec::list([unit(), unit(), unit()]),
            TaskSpec::map([("c", unit())]),
        ]);
        let first = normalize(spec).unwrap();
        let shape: Vec<_> = first.stages().iter().map(|s| (s.kind(), s.len())).collect();

        let second = normalize(TaskSpec::from(first)).unwrap();
        let again: Vec<_> = second.stages().iter().map(|s| (s.kind(), s.len())).collect();

        assert_eq!(second.shape(), PlanShape::Staged);
        assert_eq!(shape, again);
        assert_eq!(
            second.stages()[0].units().iter().map(|(k, _)| k.to_string()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }
}
