//! Named script catalog.
//!
//! Scripts are grouped in a tree addressed by dot-separated paths, e.g.
//! `schema.create`. Leaves are ordered statement lists; groups run their
//! children in key order.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptNode {
    Statements(Vec<String>),
    Group(BTreeMap<String, ScriptNode>),
}

impl ScriptNode {
    fn collect<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ScriptNode::Statements(statements) => out.extend(statements.iter().map(String::as_str)),
            ScriptNode::Group(children) => {
                for child in children.values() {
                    child.collect(out);
                }
            }
        }
    }
}

/// Tree of named scripts, usually loaded from the `[scripts]` config table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptCatalog {
    root: BTreeMap<String, ScriptNode>,
}

impl ScriptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a statement list at `path`, creating groups on the way.
    pub fn insert<I, S>(&mut self, path: &str, statements: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<&str> = path.split('.').collect();
        let (leaf, groups) = match segments.split_last() {
            Some((leaf, groups)) if !leaf.is_empty() => (*leaf, groups),
            _ => return Err(crate::Error::MalformedSpec(format!("Invalid script path '{}'", path))),
        };

        let mut node = &mut self.root;
        for segment in groups {
            let entry = node
                .entry(segment.to_string())
                .or_insert_with(|| ScriptNode::Group(BTreeMap::new()));
            node = match entry {
                ScriptNode::Group(children) => children,
                ScriptNode::Statements(_) => {
                    return Err(crate::Error::MalformedSpec(format!(
                        "Script '{}' is not a group",
                        segment
                    )))
                }
            };
        }
        node.insert(
            leaf.to_string(),
            ScriptNode::Statements(statements.into_iter().map(Into::into).collect()),
        );
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Statements under `path` in run order. An empty path is the whole catalog.
    pub fn resolve(&self, path: &str) -> Result<Vec<&str>> {
        let mut out = Vec::new();
        if path.is_empty() {
            for node in self.root.values() {
                node.collect(&mut out);
            }
            return Ok(out);
        }

        let mut children = &self.root;
        let mut found: Option<&ScriptNode> = None;
        for segment in path.split('.') {
            let node = children.get(segment).ok_or_else(|| {
                crate::Error::MalformedSpec(format!("Unknown script '{}'", path))
            })?;
            found = Some(node);
            children = match node {
                ScriptNode::Group(next) => next,
                ScriptNode::Statements(_) => &EMPTY,
            };
        }

        if let Some(node) = found {
            node.collect(&mut out);
        }
        Ok(out)
    }
}

static EMPTY: BTreeMap<String, ScriptNode> = BTreeMap::new();

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ScriptCatalog {
        let mut catalog = ScriptCatalog::new();
        catalog
            .insert("schema.create", ["CREATE TABLE a (id int)", "CREATE TABLE b (id int)"])
            .unwrap();
        catalog.insert("schema.drop", ["DROP TABLE a"]).unwrap();
        catalog.insert("seed", ["INSERT INTO a VALUES (1)"]).unwrap();
        catalog
    }

    #[test]
    fn test_resolve_leaf() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve("schema.create").unwrap(),
            vec!["CREATE TABLE a (id int)", "CREATE TABLE b (id int)"]
        );
    }

    #[test]
    fn test_resolve_group_in_key_order() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve("schema").unwrap(),
            vec!["CREATE TABLE a (id int)", "CREATE TABLE b (id int)", "DROP TABLE a"]
        );
        assert_eq!(catalog.resolve("").unwrap().len(), 4);
    }

    #[test]
    fn test_unknown_path() {
        let catalog = catalog();
        assert!(matches!(catalog.resolve("schema.alter"), Err(crate::Error::MalformedSpec(_))));
        assert!(matches!(catalog.resolve("seed.more"), Err(crate::Error::MalformedSpec(_))));
    }

    #[test]
    fn test_from_toml() {
        let catalog: ScriptCatalog = toml::from_str(
            r#"
            seed = ["INSERT INTO a VALUES (1)"]

            [schema]
            create = ["CREATE TABLE a (id int)"]
            "#,
        )
        .unwrap();
        assert_eq!(catalog.resolve("schema.create").unwrap(), vec!["CREATE TABLE a (id int)"]);
        assert_eq!(catalog.resolve("seed").unwrap().len(), 1);
    }
}
