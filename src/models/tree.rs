//! Output trees mirroring the shape of a task spec.
//!
//! A run produces two trees of the same shape: one holding each unit's result
//! and one holding each unit's diagnostics. Units that did not complete have
//! no entry at all.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// Position of a unit inside its stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Index(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Name(value.to_string())
    }
}

/// Whether a stage was declared as a mapping or as a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Named,
    Positional,
}

/// Entries of one stage, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTree<T> {
    kind: StageKind,
    declared: usize,
    entries: Vec<(Key, T)>,
}

impl<T> StageTree<T> {
    /// An empty tree for a stage declaring `declared` units.
    pub fn new(kind: StageKind, declared: usize) -> Self {
        Self {
            kind,
            declared,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Number of units the stage declared, completed or not.
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Append an entry. Callers insert in declaration order.
    pub fn push(&mut self, key: Key, value: T) {
        self.entries.push((key, value));
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Key::Name(n) if n == name))
            .map(|(_, v)| v)
    }

    pub fn at(&self, index: usize) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| *k == Key::Index(index))
            .map(|(_, v)| v)
    }

    pub fn entry(&self, key: &Key) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &T)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> StageTree<U> {
        StageTree {
            kind: self.kind,
            declared: self.declared,
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }
}

impl<T> IntoIterator for StageTree<T> {
    type Item = (Key, T);
    type IntoIter = std::vec::IntoIter<(Key, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T: Serialize> Serialize for StageTree<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.kind {
            StageKind::Named => {
                let mut map = serializer.serialize_map(Some(self.entries.len()))?;
                for (key, value) in &self.entries {
                    map.serialize_entry(&key.to_string(), value)?;
                }
                map.end()
            }
            StageKind::Positional => {
                // The tree holds no entry for a unit that did not complete.
                // JSON arrays cannot skip an index, so the gap is written as
                // null to keep later units at their declared positions.
                let len = self
                    .entries
                    .iter()
                    .filter_map(|(k, _)| match k {
                        Key::Index(i) => Some(i + 1),
                        Key::Name(_) => None,
                    })
                    .max()
                    .unwrap_or(0)
                    .max(self.declared);
                let mut seq = serializer.serialize_seq(Some(len))?;
                for i in 0..len {
                    match self.at(i) {
                        Some(value) => seq.serialize_element(value)?,
                        None => seq.serialize_element(&Option::<()>::None)?,
                    }
                }
                seq.end()
            }
        }
    }
}

/// Output of a whole plan, shaped like the spec that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree<T> {
    /// The unit of a single-unit spec did not complete.
    Empty,
    /// Single-unit spec.
    Leaf(T),
    /// Single-stage spec (one list or one mapping of units).
    Stage(StageTree<T>),
    /// Multi-stage spec; only stages that started are present.
    Staged(Vec<StageTree<T>>),
}

impl<T> Tree<T> {
    pub fn is_empty(&self) -> bool {
        match self {
            Tree::Empty => true,
            Tree::Leaf(_) => false,
            Tree::Stage(stage) => stage.is_empty(),
            Tree::Staged(stages) => stages.iter().all(StageTree::is_empty),
        }
    }

    pub fn leaf(&self) -> Option<&T> {
        match self {
            Tree::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// Stage trees in order. A leaf or empty tree has none.
    pub fn stages(&self) -> Vec<&StageTree<T>> {
        match self {
            Tree::Empty | Tree::Leaf(_) => Vec::new(),
            Tree::Stage(stage) => vec![stage],
            Tree::Staged(stages) => stages.iter().collect(),
        }
    }

    pub fn stage(&self, index: usize) -> Option<&StageTree<T>> {
        self.stages().into_iter().nth(index)
    }

    /// Look up a named unit in any stage, earliest stage first.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.stages().into_iter().find_map(|s| s.get(name))
    }

    /// Look up a positional unit of a single-stage tree.
    pub fn at(&self, index: usize) -> Option<&T> {
        match self {
            Tree::Stage(stage) => stage.at(index),
            _ => None,
        }
    }

    /// Total number of completed units.
    pub fn len(&self) -> usize {
        match self {
            Tree::Empty => 0,
            Tree::Leaf(_) => 1,
            Tree::Stage(stage) => stage.len(),
            Tree::Staged(stages) => stages.iter().map(StageTree::len).sum(),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Tree<U> {
        match self {
            Tree::Empty => Tree::Empty,
            Tree::Leaf(value) => Tree::Leaf(f(value)),
            Tree::Stage(stage) => Tree::Stage(stage.map(f)),
            Tree::Staged(stages) => {
                Tree::Staged(stages.into_iter().map(|s| s.map(&mut f)).collect())
            }
        }
    }

    /// Merge all stages into one stage tree.
    ///
    /// Positional stages are concatenated, each stage's indices offset by the
    /// declared size of the stages before it. Named keys are merged, a later
    /// stage replacing an earlier entry of the same name. When named and
    /// positional stages are mixed, positional entries are keyed by their
    /// offset index as a name.
    pub fn flatten(self) -> StageTree<T> {
        let stages = match self {
            Tree::Empty => return StageTree::new(StageKind::Positional, 0),
            Tree::Leaf(value) => {
                let mut stage = StageTree::new(StageKind::Positional, 1);
                stage.push(Key::Index(0), value);
                return stage;
            }
            Tree::Stage(stage) => return stage,
            Tree::Staged(stages) => stages,
        };

        let all_positional = stages.iter().all(|s| s.kind == StageKind::Positional);
        let kind = if all_positional {
            StageKind::Positional
        } else {
            StageKind::Named
        };
        let declared = stages.iter().map(|s| s.declared).sum();
        let mut merged = StageTree::new(kind, declared);

        let mut offset = 0;
        for stage in stages {
            let stage_declared = stage.declared;
            for (key, value) in stage {
                let key = match (key, kind) {
                    (Key::Index(i), StageKind::Positional) => Key::Index(offset + i),
                    (Key::Index(i), StageKind::Named) => Key::Name((offset + i).to_string()),
                    (name, _) => name,
                };
                match merged.entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(existing) => existing.1 = value,
                    None => merged.entries.push((key, value)),
                }
            }
            offset += stage_declared;
        }
        merged
    }
}

impl<T: Serialize> Serialize for Tree<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tree::Empty => serializer.serialize_none(),
            Tree::Leaf(value) => value.serialize(serializer),
            Tree::Stage(stage) => stage.serialize(serializer),
            Tree::Staged(stages) => stages.serialize(serializer),
        }
    }
}
