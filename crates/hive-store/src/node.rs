//! The in-memory tree shared by the memory and single-file stores.
//!
//! A [`SettingsNode`] owns two independent namespaces: named values and named
//! child nodes. The same name may appear in both at once. Both maps are
//! `BTreeMap`s so every enumeration is sorted without extra work.

use std::collections::BTreeMap;

use hive_types::Value;

/// One node of the settings tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsNode {
    /// Values stored directly on this node.
    pub values: BTreeMap<String, Value>,
    /// Child nodes, each a full settings node.
    pub children: BTreeMap<String, SettingsNode>,
}

impl SettingsNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk down `path` without creating anything.
    pub fn descend(&self, path: &[String]) -> Option<&SettingsNode> {
        path.iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    /// Mutable walk down `path` without creating anything.
    pub fn descend_mut(&mut self, path: &[String]) -> Option<&mut SettingsNode> {
        path.iter()
            .try_fold(self, |node, segment| node.children.get_mut(segment))
    }

    /// Walk down `path`, creating empty nodes where missing.
    pub fn descend_or_create(&mut self, path: &[String]) -> &mut SettingsNode {
        path.iter().fold(self, |node, segment| {
            node.children.entry(segment.clone()).or_default()
        })
    }

    /// Value names, ascending.
    pub fn value_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Child names, ascending.
    pub fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// Remove a child and everything beneath it in one step.
    pub fn remove_subtree(&mut self, name: &str) -> Option<SettingsNode> {
        self.children.remove(name)
    }

    /// Total number of values in this node and all descendants.
    pub fn total_values(&self) -> usize {
        self.values.len()
            + self
                .children
                .values()
                .map(SettingsNode::total_values)
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty()
    }
}
