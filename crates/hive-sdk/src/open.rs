//! Pick one settings location out of several candidates.
//!
//! Applications move their settings between releases; the opener lets them
//! list every location they have ever used, newest first, and take the first
//! that exists (and, optionally, already holds a marker value).

use std::sync::Arc;

use hive_codec::CodecRegistry;
use hive_hier::{HierarchicalMedium, HierarchicalSettingsStore};
use tracing::{debug, warn};

use crate::settings::Settings;

/// One candidate location in a hierarchical medium.
#[derive(Clone)]
pub struct StoreSpec {
    pub medium: Arc<dyn HierarchicalMedium>,
    pub path: String,
    /// If set, the candidate only matches when this value exists at `path`.
    pub required_value: Option<String>,
}

impl StoreSpec {
    pub fn new(medium: Arc<dyn HierarchicalMedium>, path: impl Into<String>) -> Self {
        Self {
            medium,
            path: path.into(),
            required_value: None,
        }
    }

    /// Only match when `name` is present.
    pub fn requiring(mut self, name: impl Into<String>) -> Self {
        self.required_value = Some(name.into());
        self
    }

    /// Whether the candidate exists and satisfies its guard. Never creates
    /// anything.
    fn matches(&self) -> bool {
        let key = match self.medium.open_key(&self.path, false) {
            Ok(Some(key)) => key,
            Ok(None) => return false,
            Err(e) => {
                warn!(path = %self.path, error = %e, "skipping unreadable settings candidate");
                return false;
            }
        };
        let Some(required) = &self.required_value else {
            return true;
        };
        match key.get_value(required) {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(path = %self.path, value = %required, error = %e, "skipping settings candidate");
                false
            }
        }
    }
}

impl std::fmt::Debug for StoreSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSpec")
            .field("path", &self.path)
            .field("required_value", &self.required_value)
            .finish_non_exhaustive()
    }
}

/// Open the first candidate that exists and satisfies its guard.
///
/// Candidates are probed in order; later ones are not consulted once one
/// matches. Returns `None` if none match.
pub fn open_first_existing(
    candidates: &[StoreSpec],
    codecs: &Arc<CodecRegistry>,
) -> Option<Settings> {
    let spec = candidates.iter().find(|spec| spec.matches())?;
    debug!(path = %spec.path, "selected settings location");
    Some(Settings::new(HierarchicalSettingsStore::new(
        Arc::clone(&spec.medium),
        spec.path.clone(),
        Arc::clone(codecs),
    )))
}
