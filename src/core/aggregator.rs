//! Output tree assembly.

use crate::models::message::UnitStats;
use crate::models::outcome::UnitOutput;
use crate::models::plan::{Plan, PlanShape, Stage};
use crate::models::tree::{Key, StageKind, StageTree, Tree};
use serde_json::Value;

/// Collects unit outputs of one stage as they settle, in any order.
pub(crate) struct StageOutputs {
    kind: StageKind,
    keys: Vec<Key>,
    outputs: Vec<Option<UnitOutput>>,
}

impl StageOutputs {
    pub(crate) fn new(stage: &Stage) -> Self {
        let keys: Vec<Key> = stage.units().into_iter().map(|(key, _)| key).collect();
        Self {
            kind: stage.kind(),
            outputs: vec![None; keys.len()],
            keys,
        }
    }

    pub(crate) fn key(&self, index: usize) -> Option<&Key> {
        self.keys.get(index)
    }

    pub(crate) fn record(&mut self, index: usize, output: UnitOutput) {
        if let Some(slot) = self.outputs.get_mut(index) {
            *slot = Some(output);
        }
    }

    /// Result and stats trees in declaration order, completed units only.
    pub(crate) fn finish(self) -> (StageTree<Value>, StageTree<UnitStats>) {
        let declared = self.keys.len();
        let mut results = StageTree::new(self.kind, declared);
        let mut stats = StageTree::new(self.kind, declared);

        for (key, output) in self.keys.into_iter().zip(self.outputs) {
            if let Some(output) = output {
                results.push(key.clone(), output.result);
                stats.push(key, output.stats);
            }
        }
        (results, stats)
    }
}

/// Shape per-stage trees like the plan's original spec.
///
/// Stages that never started are left out of a multi-stage tree; a
/// single-stage plan whose stage never started yields an empty stage tree.
pub(crate) fn assemble<T>(plan: &Plan, stages: Vec<StageTree<T>>) -> Tree<T> {
    match plan.shape() {
        PlanShape::Unit => stages
            .into_iter()
            .next()
            .and_then(|stage| stage.into_iter().next())
            .map(|(_, value)| Tree::Leaf(value))
            .unwrap_or(Tree::Empty),
        PlanShape::Stage => match stages.into_iter().next() {
            Some(stage) => Tree::Stage(stage),
            None => Tree::Stage(empty_stage(plan, 0)),
        },
        PlanShape::Staged => Tree::Staged(stages),
    }
}

fn empty_stage<T>(plan: &Plan, index: usize) -> StageTree<T> {
    match plan.stages().get(index) {
        Some(stage) => StageTree::new(stage.kind(), stage.len()),
        None => StageTree::new(StageKind::Positional, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalizer::normalize;
    use crate::models::plan::TaskSpec;

    fn unit() -> TaskSpec {
        TaskSpec::unit(|_ctx| async { Ok(UnitOutput::new(0)) })
    }

    #[test]
    fn test_outputs_follow_declaration_order() {
        let plan = normalize(TaskSpec::map([("a", unit()), ("b", unit()), ("c", unit())])).unwrap();
        let mut outputs = StageOutputs::new(&plan.stages()[0]);
        outputs.record(2, UnitOutput::new("c"));
        outputs.record(0, UnitOutput::new("a"));

        let (results, stats) = outputs.finish();
        let keys: Vec<String> = results.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(results.declared(), 3);
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_assemble_unit_shape() {
        let plan = normalize(unit()).unwrap();
        let mut outputs = StageOutputs::new(&plan.stages()[0]);
        outputs.record(0, UnitOutput::new(7));
        let (results, _) = outputs.finish();

        let tree = assemble(&plan, vec![results]);
        assert_eq!(tree.leaf(), Some(&Value::from(7)));
        assert!(matches!(assemble::<Value>(&plan, Vec::new()), Tree::Empty));
    }

    #[test]
    fn test_assemble_stage_that_never_ran() {
        let plan = normalize(TaskSpec::map([("a", unit())])).unwrap();
        match assemble::<Value>(&plan, Vec::new()) {
            Tree::Stage(stage) => {
                assert_eq!(stage.kind(), StageKind::Named);
                assert!(stage.is_empty());
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }
}
