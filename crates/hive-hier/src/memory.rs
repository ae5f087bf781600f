//! Volatile hierarchical medium, for tests and for hosts without a registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use hive_types::Primitive;

use crate::error::{MediumError, MediumResult};
use crate::medium::{HierarchicalMedium, MediumKey, SEPARATOR};

#[derive(Debug, Clone)]
struct Stored {
    value: Primitive,
    kind: Option<String>,
}

type Values = BTreeMap<String, Stored>;

#[derive(Debug, Default)]
struct Shared {
    /// Every existing key by full path. The root key is `""` and always exists.
    keys: RwLock<BTreeMap<String, Values>>,
    open_handles: AtomicUsize,
}

/// Registry-like medium held entirely in memory.
///
/// Cloning shares the same key space.
#[derive(Clone, Debug)]
pub struct InMemoryMedium {
    shared: Arc<Shared>,
    separator: char,
}

impl InMemoryMedium {
    pub fn new() -> Self {
        Self::with_separator(SEPARATOR)
    }

    pub fn with_separator(separator: char) -> Self {
        let shared = Shared::default();
        if let Ok(mut keys) = shared.keys.write() {
            keys.insert(String::new(), Values::new());
        }
        Self {
            shared: Arc::new(shared),
            separator,
        }
    }

    /// Number of key handles currently open.
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }

    /// Whether `path` names an existing key.
    pub fn contains_key(&self, path: &str) -> bool {
        self.shared
            .keys
            .read()
            .map(|keys| keys.contains_key(path))
            .unwrap_or(false)
    }

    fn handle(&self, path: &str, writable: bool) -> Box<dyn MediumKey> {
        self.shared.open_handles.fetch_add(1, Ordering::SeqCst);
        Box::new(MemoryKey {
            shared: Arc::clone(&self.shared),
            path: path.to_string(),
            separator: self.separator,
            writable,
        })
    }

    fn is_beneath(&self, candidate: &str, path: &str) -> bool {
        candidate == path
            || path.is_empty()
            || candidate
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with(self.separator))
    }
}

impl Default for InMemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchicalMedium for InMemoryMedium {
    fn separator(&self) -> char {
        self.separator
    }

    fn open_key(&self, path: &str, writable: bool) -> MediumResult<Option<Box<dyn MediumKey>>> {
        let exists = self
            .shared
            .keys
            .read()
            .map_err(|_| MediumError::LockPoisoned)?
            .contains_key(path);
        Ok(exists.then(|| self.handle(path, writable)))
    }

    fn create_key(&self, path: &str) -> MediumResult<Box<dyn MediumKey>> {
        if path.split(self.separator).any(str::is_empty) && !path.is_empty() {
            return Err(MediumError::InvalidName {
                name: path.to_string(),
                reason: "empty path segment",
            });
        }
        {
            let mut keys = self.shared.keys.write().map_err(|_| MediumError::LockPoisoned)?;
            let mut prefix = String::new();
            for segment in path.split(self.separator).filter(|s| !s.is_empty()) {
                if !prefix.is_empty() {
                    prefix.push(self.separator);
                }
                prefix.push_str(segment);
                keys.entry(prefix.clone()).or_default();
            }
        }
        Ok(self.handle(path, true))
    }

    fn delete_key_tree(&self, path: &str) -> MediumResult<()> {
        let mut keys = self.shared.keys.write().map_err(|_| MediumError::LockPoisoned)?;
        keys.retain(|candidate, _| !self.is_beneath(candidate, path));
        // The root key cannot itself be removed, only emptied.
        keys.entry(String::new()).or_default();
        Ok(())
    }
}

struct MemoryKey {
    shared: Arc<Shared>,
    path: String,
    separator: char,
    writable: bool,
}

impl MemoryKey {
    fn with_values<R>(&self, f: impl FnOnce(&Values) -> R) -> MediumResult<R> {
        let keys = self.shared.keys.read().map_err(|_| MediumError::LockPoisoned)?;
        let values = keys
            .get(&self.path)
            .ok_or_else(|| MediumError::KeyNotFound(self.path.clone()))?;
        Ok(f(values))
    }

    fn with_values_mut<R>(&mut self, f: impl FnOnce(&mut Values) -> R) -> MediumResult<R> {
        if !self.writable {
            return Err(MediumError::ReadOnly(self.path.clone()));
        }
        let mut keys = self.shared.keys.write().map_err(|_| MediumError::LockPoisoned)?;
        let values = keys
            .get_mut(&self.path)
            .ok_or_else(|| MediumError::KeyNotFound(self.path.clone()))?;
        Ok(f(values))
    }
}

impl MediumKey for MemoryKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn value_names(&self) -> MediumResult<Vec<String>> {
        self.with_values(|values| values.keys().cloned().collect())
    }

    fn get_value(&self, name: &str) -> MediumResult<Option<Primitive>> {
        self.with_values(|values| values.get(name).map(|stored| stored.value.clone()))
    }

    fn set_value(&mut self, name: &str, value: Primitive) -> MediumResult<()> {
        self.with_values_mut(|values| {
            values.insert(name.to_string(), Stored { value, kind: None });
        })
    }

    fn value_kind(&self, name: &str) -> MediumResult<Option<String>> {
        self.with_values(|values| values.get(name).and_then(|stored| stored.kind.clone()))
    }

    fn set_tagged_value(&mut self, name: &str, value: Primitive, kind: &str) -> MediumResult<()> {
        self.with_values_mut(|values| {
            let kind = Some(kind.to_string());
            values.insert(name.to_string(), Stored { value, kind });
        })
    }

    fn delete_value(&mut self, name: &str) -> MediumResult<()> {
        self.with_values_mut(|values| {
            values.remove(name);
        })
    }

    fn subkey_names(&self) -> MediumResult<Vec<String>> {
        let keys = self.shared.keys.read().map_err(|_| MediumError::LockPoisoned)?;
        if !keys.contains_key(&self.path) {
            return Err(MediumError::KeyNotFound(self.path.clone()));
        }
        let prefix = if self.path.is_empty() {
            String::new()
        } else {
            format!("{}{}", self.path, self.separator)
        };
        Ok(keys
            .keys()
            .filter_map(|candidate| candidate.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains(self.separator))
            .map(str::to_string)
            .collect())
    }
}

impl Drop for MemoryKey {
    fn drop(&mut self) {
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_always_exists() {
        let medium = InMemoryMedium::new();
        assert!(medium.open_key("", false).unwrap().is_some());
        medium.delete_key_tree("").unwrap();
        assert!(medium.open_key("", false).unwrap().is_some());
    }

    #[test]
    fn create_builds_ancestors() {
        let medium = InMemoryMedium::new();
        drop(medium.create_key("Software\\Hive\\Ftp").unwrap());
        assert!(medium.contains_key("Software"));
        assert!(medium.contains_key("Software\\Hive"));
        assert!(medium.contains_key("Software\\Hive\\Ftp"));
    }

    #[test]
    fn empty_segment_is_rejected() {
        let medium = InMemoryMedium::new();
        assert!(matches!(
            medium.create_key("a\\\\b"),
            Err(MediumError::InvalidName { .. })
        ));
    }

    #[test]
    fn read_only_handle_refuses_writes() {
        let medium = InMemoryMedium::new();
        drop(medium.create_key("k").unwrap());
        let mut key = medium.open_key("k", false).unwrap().unwrap();
        assert!(matches!(
            key.set_value("x", Primitive::Int(1)),
            Err(MediumError::ReadOnly(_))
        ));
    }

    #[test]
    fn subkeys_are_direct_children_only() {
        let medium = InMemoryMedium::new();
        drop(medium.create_key("a\\b\\c").unwrap());
        drop(medium.create_key("a\\d").unwrap());
        drop(medium.create_key("ab").unwrap());
        let key = medium.open_key("a", false).unwrap().unwrap();
        let mut names = key.subkey_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["b", "d"]);
    }

    #[test]
    fn delete_tree_spares_prefix_siblings() {
        let medium = InMemoryMedium::new();
        drop(medium.create_key("a\\x").unwrap());
        drop(medium.create_key("ab").unwrap());
        medium.delete_key_tree("a").unwrap();
        assert!(!medium.contains_key("a"));
        assert!(!medium.contains_key("a\\x"));
        assert!(medium.contains_key("ab"));
    }

    #[test]
    fn handle_on_deleted_key_reports_not_found() {
        let medium = InMemoryMedium::new();
        let mut key = medium.create_key("gone").unwrap();
        medium.delete_key_tree("gone").unwrap();
        assert!(matches!(
            key.set_value("x", Primitive::Int(1)),
            Err(MediumError::KeyNotFound(_))
        ));
    }

    #[test]
    fn kind_tags_follow_the_last_write() {
        let medium = InMemoryMedium::new();
        let mut key = medium.create_key("k").unwrap();
        key.set_tagged_value("flag", Primitive::Int(1), "Bool").unwrap();
        assert_eq!(key.value_kind("flag").unwrap().as_deref(), Some("Bool"));
        assert_eq!(key.get_value("flag").unwrap(), Some(Primitive::Int(1)));

        key.set_value("flag", Primitive::Int(0)).unwrap();
        assert_eq!(key.value_kind("flag").unwrap(), None);
        assert_eq!(key.value_kind("missing").unwrap(), None);
    }

    #[test]
    fn handles_are_counted() {
        let medium = InMemoryMedium::new();
        let key = medium.create_key("k").unwrap();
        assert_eq!(medium.open_handles(), 1);
        drop(key);
        assert_eq!(medium.open_handles(), 0);
    }
}
