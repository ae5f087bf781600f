//! Single-file settings tree for Hive.
//!
//! [`FileSettingsStore`] keeps the whole tree in memory and rewrites one
//! tagged-element document (see [`format`]) after every mutation. Batch
//! scopes defer the rewrite until the outermost scope ends. A document that
//! cannot be parsed is logged and replaced by an empty tree on open.

pub mod format;
pub mod store;

pub use format::{parse_tree, write_tree};
pub use store::{Backing, FileSettingsStore, FileStoreOptions};
