//! Task spec and normalized plan model.

use super::outcome::UnitOutput;
use super::tree::{Key, StageKind};
use crate::core::context::UnitContext;
use crate::Result;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a unit.
pub type UnitFuture = BoxFuture<'static, Result<UnitOutput>>;

/// One item of database work.
///
/// A unit is a function of its [`UnitContext`]; it may be invoked once per
/// run. Cloning shares the function.
#[derive(Clone)]
pub struct Unit {
    run: Arc<dyn Fn(UnitContext) -> UnitFuture + Send + Sync>,
}

impl Unit {
    pub fn new<F, Fut, O>(f: F) -> Self
    where
        F: Fn(UnitContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
        O: Into<UnitOutput> + Send + 'static,
    {
        Self {
            run: Arc::new(move |ctx| {
                let fut = f(ctx);
                async move { fut.await.map(Into::into) }.boxed()
            }),
        }
    }

    pub(crate) fn call(&self, ctx: UnitContext) -> UnitFuture {
        (self.run)(ctx)
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit")
    }
}

/// A plan as submitted: a unit, a list, a mapping, or a list of stages.
///
/// Any nesting can be expressed; the normalizer rejects shapes that are not
/// one of the four accepted forms.
#[derive(Debug, Clone)]
pub enum TaskSpec {
    Unit(Unit),
    List(Vec<TaskSpec>),
    Map(Vec<(String, TaskSpec)>),
}

impl TaskSpec {
    pub fn unit<F, Fut, O>(f: F) -> Self
    where
        F: Fn(UnitContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
        O: Into<UnitOutput> + Send + 'static,
    {
        TaskSpec::Unit(Unit::new(f))
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskSpec>,
    {
        TaskSpec::List(items.into_iter().map(Into::into).collect())
    }

    /// A mapping in declaration order.
    pub fn map<I, K, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<TaskSpec>,
    {
        TaskSpec::Map(
            entries
                .into_iter()
                .map(|(k, s)| (k.into(), s.into()))
                .collect(),
        )
    }
}

impl From<Unit> for TaskSpec {
    fn from(unit: Unit) -> Self {
        TaskSpec::Unit(unit)
    }
}

/// A set of units run concurrently.
#[derive(Debug, Clone)]
pub enum Stage {
    Named(Vec<(String, Unit)>),
    Positional(Vec<Unit>),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Named(_) => StageKind::Named,
            Stage::Positional(_) => StageKind::Positional,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Stage::Named(units) => units.len(),
            Stage::Positional(units) => units.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Units with their keys, in declaration order.
    pub fn units(&self) -> Vec<(Key, &Unit)> {
        match self {
            Stage::Named(units) => units
                .iter()
                .map(|(name, unit)| (Key::Name(name.clone()), unit))
                .collect(),
            Stage::Positional(units) => units
                .iter()
                .enumerate()
                .map(|(i, unit)| (Key::Index(i), unit))
                .collect(),
        }
    }
}

impl From<Stage> for TaskSpec {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Named(units) => TaskSpec::map(units),
            Stage::Positional(units) => TaskSpec::list(units),
        }
    }
}

/// Which accepted form a spec had, so output can take the same form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanShape {
    /// A single unit.
    Unit,
    /// One list or one mapping of units.
    Stage,
    /// A list of stages.
    Staged,
}

/// A normalized plan: ordered stages plus the original shape.
#[derive(Debug, Clone)]
pub struct Plan {
    shape: PlanShape,
    stages: Vec<Stage>,
}

impl Plan {
    pub(crate) fn new(shape: PlanShape, stages: Vec<Stage>) -> Self {
        Self { shape, stages }
    }

    pub fn shape(&self) -> PlanShape {
        self.shape
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Total number of units across stages.
    pub fn unit_count(&self) -> usize {
        self.stages.iter().map(Stage::len).sum()
    }
}

impl From<Plan> for TaskSpec {
    /// Rebuild a spec of the plan's original shape.
    fn from(plan: Plan) -> Self {
        match plan.shape {
            PlanShape::Unit => {
                let unit = plan.stages.into_iter().next().and_then(|stage| match stage {
                    Stage::Positional(units) => units.into_iter().next(),
                    Stage::Named(units) => units.into_iter().next().map(|(_, unit)| unit),
                });
                match unit {
                    Some(unit) => TaskSpec::Unit(unit),
                    None => TaskSpec::List(Vec::new()),
                }
            }
            PlanShape::Stage => match plan.stages.into_iter().next() {
                Some(stage) => stage.into(),
                None => TaskSpec::List(Vec::new()),
            },
            PlanShape::Staged => TaskSpec::list(plan.stages),
        }
    }
}
