//! The hierarchical medium interface: path-addressed keys holding named values.
//!
//! This mirrors an OS registry: a key is opened (read-only or writable),
//! created, or deleted together with its whole subtree; a key carries named
//! values and named subkeys in separate namespaces. Handles are short-lived;
//! callers open one per logical operation and drop it immediately.

use hive_types::Primitive;

use crate::error::MediumResult;

/// Default path separator between key segments.
pub const SEPARATOR: char = '\\';

/// Join a parent key path and a child segment.
pub fn join_path(parent: &str, child: &str, separator: char) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{separator}{child}")
    }
}

/// A path-addressed hierarchical key/value medium.
///
/// Implementations must be thread-safe per handle: many threads may open,
/// use, and drop handles concurrently.
pub trait HierarchicalMedium: Send + Sync {
    /// Separator between path segments.
    fn separator(&self) -> char {
        SEPARATOR
    }

    /// Open an existing key. Returns `Ok(None)` if it does not exist.
    fn open_key(&self, path: &str, writable: bool) -> MediumResult<Option<Box<dyn MediumKey>>>;

    /// Create a key (and any missing ancestors) and return a writable handle.
    /// Creating an existing key opens it.
    fn create_key(&self, path: &str) -> MediumResult<Box<dyn MediumKey>>;

    /// Delete a key and every key beneath it. Deleting a missing key is not
    /// an error.
    fn delete_key_tree(&self, path: &str) -> MediumResult<()>;
}

/// An open handle on one key. Dropping the handle closes it.
pub trait MediumKey: Send {
    /// Full path of the key.
    fn path(&self) -> &str;

    /// Names of the values under this key, in no particular order.
    fn value_names(&self) -> MediumResult<Vec<String>>;

    /// Read a named value. Returns `Ok(None)` if absent.
    fn get_value(&self, name: &str) -> MediumResult<Option<Primitive>>;

    /// Write a named value. Fails on a read-only handle. Any kind tag
    /// recorded for `name` is cleared.
    fn set_value(&mut self, name: &str, value: Primitive) -> MediumResult<()>;

    /// Kind tag recorded with a value by [`set_tagged_value`](Self::set_tagged_value).
    /// Media that keep no tags return `Ok(None)`.
    fn value_kind(&self, _name: &str) -> MediumResult<Option<String>> {
        Ok(None)
    }

    /// Write a named value together with the tag of the kind it encodes.
    /// Media that keep no tags store the value alone.
    fn set_tagged_value(&mut self, name: &str, value: Primitive, _kind: &str) -> MediumResult<()> {
        self.set_value(name, value)
    }

    /// Delete a named value. Deleting a missing value is not an error.
    fn delete_value(&mut self, name: &str) -> MediumResult<()>;

    /// Names of the direct subkeys, in no particular order.
    fn subkey_names(&self) -> MediumResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_from_root() {
        assert_eq!(join_path("", "Software", SEPARATOR), "Software");
    }

    #[test]
    fn join_nested() {
        assert_eq!(
            join_path("Software\\Hive", "Ftp", SEPARATOR),
            "Software\\Hive\\Ftp"
        );
        assert_eq!(join_path("a", "b", '/'), "a/b");
    }
}
