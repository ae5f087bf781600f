//! Hive settings over an external hierarchical key/value medium.
//!
//! The medium is anything shaped like an OS registry: path-addressed keys,
//! each holding named values of four primitive shapes (string, 32-bit
//! integer, string list, bytes) and named subkeys. [`HierarchicalSettingsStore`]
//! adapts such a medium to [`hive_store::SettingsStore`], converting native
//! values through [`hive_codec::CodecRegistry`].
//!
//! Two media ship with the crate:
//!
//! - [`InMemoryMedium`]: volatile, counts open handles
//! - [`DirectoryMedium`]: keys as directories, values as tagged files

pub mod directory;
pub mod error;
pub mod medium;
pub mod memory;
pub mod store;

pub use directory::DirectoryMedium;
pub use error::{MediumError, MediumResult};
pub use medium::{join_path, HierarchicalMedium, MediumKey, SEPARATOR};
pub use memory::InMemoryMedium;
pub use store::HierarchicalSettingsStore;
