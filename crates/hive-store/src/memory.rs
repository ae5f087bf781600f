//! Volatile settings store for defaults, tests, and temporary settings.
//!
//! [`MemorySettingsStore`] keeps one [`SettingsNode`] tree behind a `RwLock`.
//! Sub-settings handles are views (shared tree + path), so writes through a
//! child are visible from the parent and vice versa. Nothing is persisted and
//! [`batch_update`](SettingsStore::batch_update) is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hive_types::{Value, ValueKind};

use crate::error::{StoreError, StoreResult};
use crate::failure::FailureLog;
use crate::node::SettingsNode;
use crate::traits::{get_or_heal, BatchGuard, SettingsStore};

#[derive(Debug, Default)]
struct MemoryTree {
    root: SettingsNode,
    /// Per-node default slot, keyed by node path.
    defaults: HashMap<Vec<String>, Value>,
}

/// An in-memory implementation of [`SettingsStore`].
///
/// Cloning the handle shares the tree. Data is lost when the last handle is
/// dropped.
#[derive(Clone, Debug, Default)]
pub struct MemorySettingsStore {
    tree: Arc<RwLock<MemoryTree>>,
    path: Vec<String>,
    failures: Arc<FailureLog>,
}

impl MemorySettingsStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of this node below the root; empty for the root.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The node's default slot, held outside the name map.
    pub fn default_value(&self) -> StoreResult<Option<Value>> {
        let tree = self.tree.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tree.defaults.get(&self.path).cloned())
    }

    /// Replace the node's default slot. `None` clears it.
    pub fn set_default_value(&self, value: Option<Value>) -> StoreResult<()> {
        let mut tree = self.tree.write().map_err(|_| StoreError::LockPoisoned)?;
        match value {
            Some(v) => tree.defaults.insert(self.path.clone(), v),
            None => tree.defaults.remove(&self.path),
        };
        Ok(())
    }

    /// Snapshot of this node and its descendants.
    pub fn snapshot(&self) -> StoreResult<SettingsNode> {
        let tree = self.tree.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tree.root.descend(&self.path).cloned().unwrap_or_default())
    }

    fn read<R>(&self, f: impl FnOnce(Option<&SettingsNode>) -> R) -> StoreResult<R> {
        let tree = self.tree.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(tree.root.descend(&self.path)))
    }

    fn write<R>(&self, f: impl FnOnce(&mut SettingsNode) -> R) -> StoreResult<R> {
        let mut tree = self.tree.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(tree.root.descend_or_create(&self.path)))
    }

    fn child_path(&self, name: &str) -> Vec<String> {
        let mut path = self.path.clone();
        path.push(name.to_string());
        path
    }
}

impl SettingsStore for MemorySettingsStore {
    fn names(&self) -> StoreResult<Vec<String>> {
        self.read(|node| node.map(SettingsNode::value_names).unwrap_or_default())
    }

    fn get_raw(&self, name: &str) -> StoreResult<Option<Value>> {
        self.read(|node| node.and_then(|n| n.values.get(name).cloned()))
    }

    fn get(&self, name: &str, kind: &ValueKind, default: Option<Value>) -> Option<Value> {
        get_or_heal(self, &self.failures, name, kind, default)
    }

    fn set(&self, name: &str, value: Option<Value>) -> StoreResult<()> {
        match value {
            Some(v) => self.write(|node| {
                node.values.insert(name.to_string(), v);
            }),
            None => self.unset(name),
        }
    }

    fn unset(&self, name: &str) -> StoreResult<()> {
        let mut tree = self.tree.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(node) = tree.root.descend_mut(&self.path) {
            node.values.remove(name);
        }
        Ok(())
    }

    fn unset_subtree(&self, name: &str) -> StoreResult<()> {
        let mut tree = self.tree.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(node) = tree.root.descend_mut(&self.path) {
            node.remove_subtree(name);
        }
        let removed = self.child_path(name);
        tree.defaults.retain(|path, _| !path.starts_with(&removed));
        Ok(())
    }

    fn has_sub_settings(&self, name: &str) -> StoreResult<bool> {
        self.read(|node| node.is_some_and(|n| n.children.contains_key(name)))
    }

    fn sub_settings(&self, name: &str) -> StoreResult<Box<dyn SettingsStore>> {
        self.write(|node| {
            node.children.entry(name.to_string()).or_default();
        })?;
        Ok(Box::new(Self {
            tree: Arc::clone(&self.tree),
            path: self.child_path(name),
            failures: Arc::clone(&self.failures),
        }))
    }

    fn sub_setting_names(&self) -> StoreResult<Vec<String>> {
        self.read(|node| node.map(SettingsNode::child_names).unwrap_or_default())
    }

    fn batch_update(&self) -> BatchGuard {
        BatchGuard::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_get_raw() {
        let store = MemorySettingsStore::new();
        store.set("retries", Some(Value::Int32(5))).unwrap();
        assert_eq!(store.get_raw("retries").unwrap(), Some(Value::Int32(5)));
        assert_eq!(store.get_raw("missing").unwrap(), None);
    }

    #[test]
    fn setting_none_unsets() {
        let store = MemorySettingsStore::new();
        store.set("k", Some(Value::Bool(true))).unwrap();
        store.set("k", None).unwrap();
        assert_eq!(store.get_raw("k").unwrap(), None);
    }

    #[test]
    fn unset_missing_is_ok() {
        let store = MemorySettingsStore::new();
        store.unset("never-set").unwrap();
    }

    #[test]
    fn names_sorted_regardless_of_insertion_order() {
        let store = MemorySettingsStore::new();
        for name in ["c", "a", "b"] {
            store.set(name, Some(Value::Int32(1))).unwrap();
        }
        assert_eq!(store.names().unwrap(), vec!["a", "b", "c"]);
    }

    // -----------------------------------------------------------------------
    // Self-healing typed reads
    // -----------------------------------------------------------------------

    #[test]
    fn missing_value_returns_and_persists_default() {
        let store = MemorySettingsStore::new();
        let got = store.get("missing", &ValueKind::Int32, Some(Value::Int32(42)));
        assert_eq!(got, Some(Value::Int32(42)));
        assert_eq!(store.get_raw("missing").unwrap(), Some(Value::Int32(42)));
    }

    #[test]
    fn kind_mismatch_falls_back_to_default() {
        let store = MemorySettingsStore::new();
        store.set("x", Some(Value::String("seven".into()))).unwrap();
        let got = store.get("x", &ValueKind::Int32, Some(Value::Int32(7)));
        assert_eq!(got, Some(Value::Int32(7)));
        assert_eq!(store.get_raw("x").unwrap(), Some(Value::Int32(7)));
    }

    #[test]
    fn no_default_means_no_write() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.get("absent", &ValueKind::String, None), None);
        assert!(store.names().unwrap().is_empty());
    }

    #[test]
    fn matching_kind_is_returned_untouched() {
        let store = MemorySettingsStore::new();
        store.set("name", Some(Value::String("hive".into()))).unwrap();
        let got = store.get("name", &ValueKind::String, Some(Value::String("x".into())));
        assert_eq!(got, Some(Value::String("hive".into())));
    }

    // -----------------------------------------------------------------------
    // Sub-settings
    // -----------------------------------------------------------------------

    #[test]
    fn sub_settings_are_created_on_demand_and_shared() {
        let store = MemorySettingsStore::new();
        assert!(!store.has_sub_settings("ftp").unwrap());
        let ftp = store.sub_settings("ftp").unwrap();
        assert!(store.has_sub_settings("ftp").unwrap());

        ftp.set("host", Some(Value::String("example.com".into()))).unwrap();
        let again = store.sub_settings("ftp").unwrap();
        assert_eq!(
            again.get_raw("host").unwrap(),
            Some(Value::String("example.com".into()))
        );
    }

    #[test]
    fn unset_subtree_leaves_siblings_intact() {
        let store = MemorySettingsStore::new();
        let a = store.sub_settings("a").unwrap();
        a.sub_settings("deep").unwrap().set("x", Some(Value::Int32(1))).unwrap();
        let b = store.sub_settings("b").unwrap();
        b.sub_settings("deep").unwrap().set("y", Some(Value::Int32(2))).unwrap();

        store.unset_subtree("a").unwrap();

        assert_eq!(store.sub_setting_names().unwrap(), vec!["b"]);
        let b_deep = store.sub_settings("b").unwrap().sub_settings("deep").unwrap();
        assert_eq!(b_deep.get_raw("y").unwrap(), Some(Value::Int32(2)));
    }

    #[test]
    fn value_and_child_with_same_name_coexist() {
        let store = MemorySettingsStore::new();
        store.set("ftp", Some(Value::Bool(true))).unwrap();
        store.sub_settings("ftp").unwrap();
        assert_eq!(store.names().unwrap(), vec!["ftp"]);
        assert_eq!(store.sub_setting_names().unwrap(), vec!["ftp"]);
    }

    // -----------------------------------------------------------------------
    // Default slot
    // -----------------------------------------------------------------------

    #[test]
    fn default_slot_is_separate_from_names() {
        let store = MemorySettingsStore::new();
        store.set_default_value(Some(Value::String("fallback".into()))).unwrap();
        assert!(store.names().unwrap().is_empty());
        assert_eq!(
            store.default_value().unwrap(),
            Some(Value::String("fallback".into()))
        );
        store.set_default_value(None).unwrap();
        assert_eq!(store.default_value().unwrap(), None);
    }

    #[test]
    fn default_slot_is_per_node() {
        let root = MemorySettingsStore::new();
        root.set_default_value(Some(Value::Int32(1))).unwrap();
        let child = MemorySettingsStore {
            path: vec!["child".into()],
            ..root.clone()
        };
        assert_eq!(child.default_value().unwrap(), None);
    }

    #[test]
    fn batch_update_is_noop() {
        let store = MemorySettingsStore::new();
        let guard = store.batch_update();
        store.set("a", Some(Value::Int32(1))).unwrap();
        drop(guard);
        assert_eq!(store.get_raw("a").unwrap(), Some(Value::Int32(1)));
    }
}
