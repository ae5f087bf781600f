//! The single-file settings store.
//!
//! The whole tree lives in memory behind one mutex owned by the root handle.
//! Every mutation rewrites the entire document from the root, unless a batch
//! scope is open, in which case the rewrite happens when the outermost scope
//! ends. Sub-settings handles are path views that lock and persist through
//! the root, so mutations of different subtrees are serialized through one
//! lock and one writer.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use hive_store::{
    BatchGuard, BatchScope, FailureLog, SettingsNode, SettingsStore, StoreError, StoreResult,
};
use hive_types::{Value, ValueKind};
use tracing::{debug, info, warn};

use crate::format::{parse_tree, write_tree};

/// A random-access byte stream the store can rewrite in place.
pub trait Backing: Read + Write + Seek + Send {
    /// Cut the stream to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Push written bytes to durable storage.
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Backing for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl Backing for Cursor<Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().truncate(len as usize);
        Ok(())
    }
}

/// Options for [`FileSettingsStore::open`].
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    /// Create the file if it does not exist.
    pub create_if_missing: bool,
    /// `fsync` after every rewrite.
    pub sync_on_write: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: false,
        }
    }
}

struct FileState {
    tree: SettingsNode,
    /// `None` once the store is closed.
    backing: Option<Box<dyn Backing>>,
    batch_depth: usize,
    /// Mutations made inside a batch that are not yet on disk.
    dirty: bool,
    writes: u64,
}

struct Shared {
    state: Mutex<FileState>,
    failures: FailureLog,
    sync_on_write: bool,
    label: String,
}

impl Shared {
    fn lock(&self) -> StoreResult<MutexGuard<'_, FileState>> {
        let state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        if state.backing.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    /// Rewrite the whole document, unless a batch defers it.
    fn persist(&self, state: &mut FileState) -> StoreResult<()> {
        if state.batch_depth > 0 {
            state.dirty = true;
            return Ok(());
        }
        self.write_out(state)
    }

    fn write_out(&self, state: &mut FileState) -> StoreResult<()> {
        let bytes = write_tree(&state.tree)?;
        let backing = state.backing.as_mut().ok_or(StoreError::Closed)?;
        backing.seek(SeekFrom::Start(0))?;
        backing.write_all(&bytes)?;
        backing.truncate(bytes.len() as u64)?;
        backing.flush()?;
        if self.sync_on_write {
            backing.sync()?;
        }
        state.dirty = false;
        state.writes += 1;
        debug!(store = %self.label, bytes = bytes.len(), "persisted settings tree");
        Ok(())
    }

    fn mutate<R>(
        &self,
        path: &[String],
        f: impl FnOnce(&mut SettingsNode) -> R,
    ) -> StoreResult<R> {
        let mut state = self.lock()?;
        let result = f(state.tree.descend_or_create(path));
        self.persist(&mut state)?;
        Ok(result)
    }

    fn read<R>(&self, path: &[String], f: impl FnOnce(Option<&SettingsNode>) -> R) -> StoreResult<R> {
        let state = self.lock()?;
        Ok(f(state.tree.descend(path)))
    }

    fn names(&self, path: &[String]) -> StoreResult<Vec<String>> {
        self.read(path, |node| node.map(SettingsNode::value_names).unwrap_or_default())
    }

    fn get_raw(&self, path: &[String], name: &str) -> StoreResult<Option<Value>> {
        self.read(path, |node| node.and_then(|n| n.values.get(name).cloned()))
    }

    /// Typed read with the check and the healing write under one lock.
    fn get_or_heal(
        &self,
        path: &[String],
        name: &str,
        kind: &ValueKind,
        default: Option<Value>,
    ) -> StoreResult<Option<Value>> {
        let mut state = self.lock()?;
        let current = state
            .tree
            .descend(path)
            .and_then(|node| node.values.get(name));
        if let Some(value) = current.filter(|v| v.is_kind(kind)) {
            return Ok(Some(value.clone()));
        }
        let Some(default) = default else {
            return Ok(None);
        };
        state
            .tree
            .descend_or_create(path)
            .values
            .insert(name.to_string(), default.clone());
        self.persist(&mut state)?;
        Ok(Some(default))
    }

    fn set(&self, path: &[String], name: &str, value: Option<Value>) -> StoreResult<()> {
        match value {
            Some(v) => self.mutate(path, |node| {
                node.values.insert(name.to_string(), v);
            }),
            None => self.unset(path, name),
        }
    }

    fn unset(&self, path: &[String], name: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        let removed = state
            .tree
            .descend_mut(path)
            .and_then(|node| node.values.remove(name))
            .is_some();
        if removed {
            self.persist(&mut state)?;
        }
        Ok(())
    }

    fn unset_subtree(&self, path: &[String], name: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        let removed = state
            .tree
            .descend_mut(path)
            .and_then(|node| node.remove_subtree(name))
            .is_some();
        if removed {
            self.persist(&mut state)?;
        }
        Ok(())
    }

    fn has_sub_settings(&self, path: &[String], name: &str) -> StoreResult<bool> {
        self.read(path, |node| node.is_some_and(|n| n.children.contains_key(name)))
    }

    fn sub_setting_names(&self, path: &[String]) -> StoreResult<Vec<String>> {
        self.read(path, |node| node.map(SettingsNode::child_names).unwrap_or_default())
    }

    fn ensure_child(&self, path: &[String], name: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        let node = state.tree.descend_or_create(path);
        if node.children.contains_key(name) {
            return Ok(());
        }
        node.children.insert(name.to_string(), SettingsNode::new());
        self.persist(&mut state)
    }

    fn begin_batch(self: &Arc<Self>) -> BatchGuard {
        match self.lock() {
            Ok(mut state) => {
                state.batch_depth += 1;
                BatchGuard::new(Box::new(BatchRelease {
                    shared: Arc::downgrade(self),
                }))
            }
            Err(e) => {
                self.failures.report("batch", &e);
                BatchGuard::noop()
            }
        }
    }

    fn end_batch(&self) {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                self.failures.report("batch", &e);
                return;
            }
        };
        debug_assert!(state.batch_depth > 0, "batch released more often than opened");
        state.batch_depth = state.batch_depth.saturating_sub(1);
        if state.batch_depth == 0 && state.dirty {
            if let Err(e) = self.write_out(&mut state) {
                self.failures.report("batch", &e);
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let Ok(state) = self.state.get_mut() else {
            return;
        };
        if state.dirty && state.backing.is_some() {
            let mut state = std::mem::replace(
                state,
                FileState {
                    tree: SettingsNode::new(),
                    backing: None,
                    batch_depth: 0,
                    dirty: false,
                    writes: 0,
                },
            );
            if let Err(e) = self.write_out(&mut state) {
                warn!(store = %self.label, error = %e, "lost unsaved settings on drop");
            }
        }
    }
}

struct BatchRelease {
    shared: Weak<Shared>,
}

impl BatchScope for BatchRelease {
    fn release(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.end_batch();
        }
    }
}

/// Settings tree persisted as one tagged-element document.
pub struct FileSettingsStore {
    shared: Arc<Shared>,
}

impl FileSettingsStore {
    /// Open (or create) the settings file at `path`.
    pub fn open(path: impl AsRef<Path>, options: &FileStoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(options.create_if_missing)
            .truncate(false)
            .open(path)?;
        Self::build(Box::new(file), path.display().to_string(), options)
    }

    /// Use an already-open stream. Its current contents are parsed.
    pub fn from_backing(backing: Box<dyn Backing>) -> StoreResult<Self> {
        Self::build(backing, "<stream>".to_string(), &FileStoreOptions::default())
    }

    fn build(
        mut backing: Box<dyn Backing>,
        label: String,
        options: &FileStoreOptions,
    ) -> StoreResult<Self> {
        let mut bytes = Vec::new();
        backing.seek(SeekFrom::Start(0))?;
        backing.read_to_end(&mut bytes)?;
        let tree = if bytes.is_empty() {
            SettingsNode::new()
        } else {
            match parse_tree(&bytes) {
                Ok(tree) => tree,
                Err(e) => {
                    warn!(store = %label, error = %e, "settings file unreadable; starting empty");
                    SettingsNode::new()
                }
            }
        };
        info!(store = %label, values = tree.total_values(), "opened settings file");
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(FileState {
                    tree,
                    backing: Some(backing),
                    batch_depth: 0,
                    dirty: false,
                    writes: 0,
                }),
                failures: FailureLog::new(),
                sync_on_write: options.sync_on_write,
                label,
            }),
        })
    }

    /// Flush any deferred changes and release the stream. Views obtained
    /// from this store fail with [`StoreError::Closed`] afterwards.
    pub fn close(self) -> StoreResult<()> {
        let mut state = self.shared.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        if state.backing.is_none() {
            return Ok(());
        }
        if state.batch_depth > 0 {
            warn!(store = %self.shared.label, depth = state.batch_depth, "closing inside a batch");
        }
        if state.dirty {
            self.shared.write_out(&mut state)?;
        }
        if let Some(mut backing) = state.backing.take() {
            backing.flush()?;
        }
        debug!(store = %self.shared.label, "closed settings file");
        Ok(())
    }

    /// Number of full-document rewrites so far.
    pub fn write_count(&self) -> StoreResult<u64> {
        Ok(self.shared.lock()?.writes)
    }

    /// Copy of the in-memory tree.
    pub fn snapshot(&self) -> StoreResult<SettingsNode> {
        Ok(self.shared.lock()?.tree.clone())
    }

    /// Label used in logs: the file path, or `<stream>`.
    pub fn label(&self) -> &str {
        &self.shared.label
    }
}

impl std::fmt::Debug for FileSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSettingsStore")
            .field("label", &self.shared.label)
            .finish_non_exhaustive()
    }
}

fn child_path(path: &[String], name: &str) -> Vec<String> {
    let mut child = path.to_vec();
    child.push(name.to_string());
    child
}

impl SettingsStore for FileSettingsStore {
    fn names(&self) -> StoreResult<Vec<String>> {
        self.shared.names(&[])
    }

    fn get_raw(&self, name: &str) -> StoreResult<Option<Value>> {
        self.shared.get_raw(&[], name)
    }

    fn get(&self, name: &str, kind: &ValueKind, default: Option<Value>) -> Option<Value> {
        match self.shared.get_or_heal(&[], name, kind, default.clone()) {
            Ok(value) => value,
            Err(e) => {
                self.shared.failures.report(name, &e);
                default
            }
        }
    }

    fn set(&self, name: &str, value: Option<Value>) -> StoreResult<()> {
        self.shared.set(&[], name, value)
    }

    fn unset(&self, name: &str) -> StoreResult<()> {
        self.shared.unset(&[], name)
    }

    fn unset_subtree(&self, name: &str) -> StoreResult<()> {
        self.shared.unset_subtree(&[], name)
    }

    fn has_sub_settings(&self, name: &str) -> StoreResult<bool> {
        self.shared.has_sub_settings(&[], name)
    }

    fn sub_settings(&self, name: &str) -> StoreResult<Box<dyn SettingsStore>> {
        self.shared.ensure_child(&[], name)?;
        Ok(Box::new(FileSubSettings {
            shared: Arc::downgrade(&self.shared),
            path: vec![name.to_string()],
        }))
    }

    fn sub_setting_names(&self) -> StoreResult<Vec<String>> {
        self.shared.sub_setting_names(&[])
    }

    fn batch_update(&self) -> BatchGuard {
        self.shared.begin_batch()
    }
}

/// A child node of a [`FileSettingsStore`]. Locks and persists via the root.
struct FileSubSettings {
    shared: Weak<Shared>,
    path: Vec<String>,
}

impl FileSubSettings {
    fn shared(&self) -> StoreResult<Arc<Shared>> {
        self.shared.upgrade().ok_or(StoreError::Closed)
    }

    fn site(&self, name: &str) -> String {
        child_path(&self.path, name).join("/")
    }
}

impl SettingsStore for FileSubSettings {
    fn names(&self) -> StoreResult<Vec<String>> {
        self.shared()?.names(&self.path)
    }

    fn get_raw(&self, name: &str) -> StoreResult<Option<Value>> {
        self.shared()?.get_raw(&self.path, name)
    }

    fn get(&self, name: &str, kind: &ValueKind, default: Option<Value>) -> Option<Value> {
        let Ok(shared) = self.shared() else {
            return default;
        };
        match shared.get_or_heal(&self.path, name, kind, default.clone()) {
            Ok(value) => value,
            Err(e) => {
                shared.failures.report(&self.site(name), &e);
                default
            }
        }
    }

    fn set(&self, name: &str, value: Option<Value>) -> StoreResult<()> {
        self.shared()?.set(&self.path, name, value)
    }

    fn unset(&self, name: &str) -> StoreResult<()> {
        self.shared()?.unset(&self.path, name)
    }

    fn unset_subtree(&self, name: &str) -> StoreResult<()> {
        self.shared()?.unset_subtree(&self.path, name)
    }

    fn has_sub_settings(&self, name: &str) -> StoreResult<bool> {
        self.shared()?.has_sub_settings(&self.path, name)
    }

    fn sub_settings(&self, name: &str) -> StoreResult<Box<dyn SettingsStore>> {
        self.shared()?.ensure_child(&self.path, name)?;
        Ok(Box::new(FileSubSettings {
            shared: self.shared.clone(),
            path: child_path(&self.path, name),
        }))
    }

    fn sub_setting_names(&self) -> StoreResult<Vec<String>> {
        self.shared()?.sub_setting_names(&self.path)
    }

    fn batch_update(&self) -> BatchGuard {
        match self.shared() {
            Ok(shared) => shared.begin_batch(),
            Err(_) => BatchGuard::noop(),
        }
    }
}
