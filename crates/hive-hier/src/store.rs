//! [`SettingsStore`] over a [`HierarchicalMedium`].
//!
//! Every operation opens the node's key, uses it, and drops it. No handle is
//! kept between calls. Native values pass through the [`CodecRegistry`] on
//! the way in and out, and are written with their kind tag so an untyped
//! read can restore the kind on media that keep tags.

use std::sync::Arc;

use hive_codec::{CodecRegistry, CodecResult};
use hive_store::{BatchGuard, FailureLog, SettingsStore, StoreError, StoreResult};
use hive_types::{Primitive, Value, ValueKind};
use tracing::debug;

use crate::error::{MediumError, MediumResult};
use crate::medium::{join_path, HierarchicalMedium, MediumKey};

/// One node of a settings tree living in an external hierarchical medium.
#[derive(Clone)]
pub struct HierarchicalSettingsStore {
    medium: Arc<dyn HierarchicalMedium>,
    path: String,
    codecs: Arc<CodecRegistry>,
    failures: Arc<FailureLog>,
}

impl HierarchicalSettingsStore {
    /// A store rooted at `path` in `medium`. The key is created lazily on
    /// first access.
    pub fn new(
        medium: Arc<dyn HierarchicalMedium>,
        path: impl Into<String>,
        codecs: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            medium,
            path: path.into(),
            codecs,
            failures: Arc::new(FailureLog::new()),
        }
    }

    /// Full key path of this node.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn child_path(&self, name: &str) -> String {
        join_path(&self.path, name, self.medium.separator())
    }

    /// Open the node's key, creating it if missing. A created key is closed
    /// and reopened with the requested access, so reads never hold a writable
    /// handle.
    fn try_key(&self, writable: bool) -> MediumResult<Box<dyn MediumKey>> {
        if let Some(key) = self.medium.open_key(&self.path, writable)? {
            return Ok(key);
        }
        drop(self.medium.create_key(&self.path)?);
        debug!(path = %self.path, "created settings key");
        self.medium
            .open_key(&self.path, writable)?
            .ok_or_else(|| MediumError::KeyNotFound(self.path.clone()))
    }

    /// Like `try_key`, with failures logged once per path and swallowed.
    fn key(&self, writable: bool) -> Option<Box<dyn MediumKey>> {
        match self.try_key(writable) {
            Ok(key) => Some(key),
            Err(e) => {
                self.failures.report(&self.path, &e);
                None
            }
        }
    }

    fn writable_key(&self) -> StoreResult<Box<dyn MediumKey>> {
        self.try_key(true).map_err(|e| {
            self.failures.report(&self.path, &e);
            e.at(&self.path)
        })
    }

    /// Decode a stored primitive without knowing the requested kind.
    fn decode_untyped(&self, primitive: Primitive) -> CodecResult<Value> {
        Ok(match primitive {
            Primitive::Bytes(bytes) => self.codecs.decode_blob(&bytes)?,
            Primitive::Str(s) => Value::String(s),
            Primitive::Int(i) => Value::Int32(i),
            Primitive::Strings(items) => Value::Strings(items),
        })
    }

    fn read_typed(&self, name: &str, kind: &ValueKind) -> StoreResult<Option<Value>> {
        let Some(key) = self.key(false) else {
            return Ok(None);
        };
        let Some(primitive) = key.get_value(name).map_err(|e| e.at(&self.path))? else {
            return Ok(None);
        };
        drop(key);
        Ok(self.codecs.decode(&primitive, kind)?)
    }
}

impl std::fmt::Debug for HierarchicalSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchicalSettingsStore")
            .field("path", &self.path)
            .field("codecs", &self.codecs.len())
            .finish_non_exhaustive()
    }
}

impl SettingsStore for HierarchicalSettingsStore {
    fn names(&self) -> StoreResult<Vec<String>> {
        let Some(key) = self.key(false) else {
            return Ok(Vec::new());
        };
        let mut names = key.value_names().map_err(|e| e.at(&self.path))?;
        names.sort();
        Ok(names)
    }

    fn get_raw(&self, name: &str) -> StoreResult<Option<Value>> {
        let Some(key) = self.key(false) else {
            return Ok(None);
        };
        let Some(primitive) = key.get_value(name).map_err(|e| e.at(&self.path))? else {
            return Ok(None);
        };
        let recorded = key.value_kind(name).map_err(|e| e.at(&self.path))?;
        drop(key);
        if let Some(kind) = recorded.and_then(|tag| tag.parse::<ValueKind>().ok()) {
            if let Some(value) = self.codecs.decode(&primitive, &kind)? {
                return Ok(Some(value));
            }
        }
        Ok(Some(self.decode_untyped(primitive)?))
    }

    fn get(&self, name: &str, kind: &ValueKind, default: Option<Value>) -> Option<Value> {
        match self.read_typed(name, kind) {
            Ok(Some(value)) if value.is_kind(kind) => return Some(value),
            Ok(_) => {}
            Err(e) => {
                self.failures.report(&self.child_path(name), &e);
            }
        }
        let default = default?;
        if let Err(e) = self.set(name, Some(default.clone())) {
            self.failures.report(&self.child_path(name), &e);
        }
        Some(default)
    }

    fn set(&self, name: &str, value: Option<Value>) -> StoreResult<()> {
        let Some(value) = value else {
            return self.unset(name);
        };
        let primitive = self.codecs.encode(&value)?;
        let mut key = self.writable_key()?;
        key.set_tagged_value(name, primitive, value.kind().tag())
            .map_err(|e| e.at(&self.path))
    }

    fn unset(&self, name: &str) -> StoreResult<()> {
        let mut key = self.writable_key()?;
        key.delete_value(name).map_err(|e| e.at(&self.path))
    }

    fn unset_subtree(&self, name: &str) -> StoreResult<()> {
        let path = self.child_path(name);
        self.medium
            .delete_key_tree(&path)
            .map_err(|e| e.at(&path))?;
        debug!(%path, "removed settings subtree");
        Ok(())
    }

    fn has_sub_settings(&self, name: &str) -> StoreResult<bool> {
        let path = self.child_path(name);
        let key = self.medium.open_key(&path, false).map_err(|e| e.at(&path))?;
        Ok(key.is_some())
    }

    fn sub_settings(&self, name: &str) -> StoreResult<Box<dyn SettingsStore>> {
        let path = self.child_path(name);
        drop(self.medium.create_key(&path).map_err(|e| e.at(&path))?);
        Ok(Box::new(Self {
            medium: Arc::clone(&self.medium),
            path,
            codecs: Arc::clone(&self.codecs),
            failures: Arc::clone(&self.failures),
        }))
    }

    fn sub_setting_names(&self) -> StoreResult<Vec<String>> {
        let Some(key) = self.key(false) else {
            return Ok(Vec::new());
        };
        let mut names = key.subkey_names().map_err(|e| e.at(&self.path))?;
        names.sort();
        Ok(names)
    }

    fn batch_update(&self) -> BatchGuard {
        BatchGuard::noop()
    }
}
