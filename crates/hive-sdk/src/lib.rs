//! High-level settings API for Hive.
//!
//! [`Settings`] is the typed façade applications use: one getter/setter pair
//! per supported type, structured values for anything serde can encode,
//! subtree copy, and batch scopes. It works over any
//! [`SettingsStore`](hive_store::SettingsStore): the in-memory store, a
//! hierarchical medium, or a single settings file.
//!
//! [`open_first_existing`] picks among legacy and current locations, and
//! [`SettingsEnvironment`] opens an application's user and machine settings.

pub mod environment;
pub mod error;
pub mod open;
pub mod settings;

pub use environment::{EnvironmentConfig, SettingsEnvironment};
pub use error::{SdkError, SdkResult};
pub use open::{open_first_existing, StoreSpec};
pub use settings::Settings;

// Re-export key types
pub use hive_codec::CodecRegistry;
pub use hive_file::{FileSettingsStore, FileStoreOptions};
pub use hive_hier::{DirectoryMedium, HierarchicalSettingsStore, InMemoryMedium};
pub use hive_store::{BatchGuard, MemorySettingsStore, SettingsStore};
pub use hive_types::{Point, Rectangle, Size, SizeF, Value, ValueKind};
