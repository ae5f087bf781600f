//! Settings store contract for Hive.
//!
//! A settings store is a hierarchical, typed key/value tree. Every backing
//! medium implements the [`SettingsStore`] trait:
//!
//! - [`MemorySettingsStore`]: volatile tree, for defaults and tests
//! - `hive-hier`: adapter over an external hierarchical key/value medium
//! - `hive-file`: whole tree in one file, rewritten on every mutation
//!
//! # Design Rules
//!
//! 1. Value names and child names are independent namespaces.
//! 2. Enumerations are always sorted ascending.
//! 3. Typed reads never return a value of another kind; they fall back to the
//!    caller's default and persist it (self-healing).
//! 4. Subtree deletion is all-or-nothing where the medium allows it.
//! 5. Batch scopes nest; only the outermost release may trigger a durable write.

pub mod error;
pub mod failure;
pub mod memory;
pub mod node;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use failure::FailureLog;
pub use memory::MemorySettingsStore;
pub use node::SettingsNode;
pub use traits::{get_or_heal, BatchGuard, BatchScope, SettingsStore};
