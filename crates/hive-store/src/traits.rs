//! The [`SettingsStore`] trait every backing medium implements.
//!
//! The contract is the same for volatile memory, an external hierarchical
//! medium, and a single-file tree. Backends differ only in durability and in
//! what [`SettingsStore::batch_update`] actually defers.

use hive_types::{Value, ValueKind};

use crate::error::StoreResult;
use crate::failure::FailureLog;

/// One node of a hierarchical, typed key/value settings tree.
///
/// Within a node, the value namespace and the sub-settings namespace are
/// independent: a name may denote a value, a child node, or both.
pub trait SettingsStore: Send + Sync {
    /// Names of the values on this node, sorted ascending.
    fn names(&self) -> StoreResult<Vec<String>>;

    /// Low-level read. Returns `Ok(None)` if the name is absent.
    ///
    /// Faults are propagated. Callers that only want a usable value should
    /// use [`get`](Self::get) with a default instead.
    fn get_raw(&self, name: &str) -> StoreResult<Option<Value>>;

    /// High-level typed read with self-healing default.
    ///
    /// Returns the stored value only if it is of `kind`. On absence, kind
    /// mismatch, or any store fault, returns `default` and, if a default was
    /// given, attempts to persist it under `name`. Faults are logged once per
    /// distinct name and never surface.
    fn get(&self, name: &str, kind: &ValueKind, default: Option<Value>) -> Option<Value>;

    /// Store `value` under `name`. `None` is the same as [`unset`](Self::unset).
    fn set(&self, name: &str, value: Option<Value>) -> StoreResult<()>;

    /// Remove the value `name`. Removing an absent name is not an error.
    fn unset(&self, name: &str) -> StoreResult<()>;

    /// Remove the child node `name` and everything beneath it.
    fn unset_subtree(&self, name: &str) -> StoreResult<()>;

    /// Whether a child node `name` exists.
    fn has_sub_settings(&self, name: &str) -> StoreResult<bool>;

    /// The child node `name`, created on demand.
    fn sub_settings(&self, name: &str) -> StoreResult<Box<dyn SettingsStore>>;

    /// Names of the child nodes, sorted ascending.
    fn sub_setting_names(&self) -> StoreResult<Vec<String>>;

    /// Open a batch-update scope. Durable writes may be deferred until the
    /// outermost guard is dropped; reads inside the scope still observe every
    /// write made in it.
    fn batch_update(&self) -> BatchGuard;
}

/// The release side of a batch-update scope.
pub trait BatchScope: Send {
    /// Called exactly once, when the owning [`BatchGuard`] is released.
    fn release(&mut self);
}

/// Scoped token returned by [`SettingsStore::batch_update`].
///
/// Dropping the guard ends the scope on every exit path, including unwinding.
/// Ending a scope twice is impossible: release consumes the scope.
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct BatchGuard {
    scope: Option<Box<dyn BatchScope>>,
}

impl BatchGuard {
    /// A guard whose release does nothing, for stores without deferred writes.
    pub fn noop() -> Self {
        Self { scope: None }
    }

    pub fn new(scope: Box<dyn BatchScope>) -> Self {
        Self { scope: Some(scope) }
    }

    /// End the scope now instead of at the end of the enclosing block.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(mut scope) = self.scope.take() {
            scope.release();
        }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for BatchGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchGuard")
            .field("active", &self.scope.is_some())
            .finish()
    }
}

/// Shared implementation of the self-healing typed read on top of
/// [`SettingsStore::get_raw`] and [`SettingsStore::set`].
pub fn get_or_heal<S: SettingsStore + ?Sized>(
    store: &S,
    failures: &FailureLog,
    name: &str,
    kind: &ValueKind,
    default: Option<Value>,
) -> Option<Value> {
    match store.get_raw(name) {
        Ok(Some(value)) if value.is_kind(kind) => return Some(value),
        Ok(_) => {}
        Err(e) => {
            failures.report(name, &e);
        }
    }
    let default = default?;
    if let Err(e) = store.set(name, Some(default.clone())) {
        failures.report(name, &e);
    }
    Some(default)
}
