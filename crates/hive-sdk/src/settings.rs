use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use hive_store::{BatchGuard, MemorySettingsStore, SettingsStore};
use hive_types::{
    Decimal, NaiveDateTime, NativeValue, Point, Rectangle, Size, SizeF, StructuredValue, Value,
    ValueKind,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SdkResult;

/// Typed view over one node of any [`SettingsStore`].
///
/// Typed getters never fail: a missing, mistyped, or unreadable value yields
/// the default, which is also written back so later reads see it. Cloning
/// shares the underlying store.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
}

macro_rules! typed_accessors {
    ($($get:ident / $set:ident : $ty:ty),* $(,)?) => {
        $(
            pub fn $get(&self, name: &str, default: $ty) -> $ty {
                self.get(name, default)
            }

            pub fn $set(&self, name: &str, value: $ty) -> SdkResult<()> {
                self.set(name, value)
            }
        )*
    };
}

impl Settings {
    pub fn new(store: impl SettingsStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_shared(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Volatile settings, for defaults and tests.
    pub fn in_memory() -> Self {
        Self::new(MemorySettingsStore::new())
    }

    /// The underlying store.
    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    // ---- Generic access ----

    /// Typed read with self-healing default.
    pub fn get<T: NativeValue + Clone>(&self, name: &str, default: T) -> T {
        self.store
            .get(name, &T::kind(), Some(default.clone().into_value()))
            .and_then(T::from_value)
            .unwrap_or(default)
    }

    /// Typed read without a default. Writes nothing.
    pub fn get_opt<T: NativeValue>(&self, name: &str) -> Option<T> {
        self.store
            .get(name, &T::kind(), None)
            .and_then(T::from_value)
    }

    pub fn set<T: NativeValue>(&self, name: &str, value: T) -> SdkResult<()> {
        self.store.set(name, Some(value.into_value()))?;
        Ok(())
    }

    /// Untyped low-level read. Faults propagate.
    pub fn get_value(&self, name: &str) -> SdkResult<Option<Value>> {
        Ok(self.store.get_raw(name)?)
    }

    /// Untyped write; `None` unsets.
    pub fn set_value(&self, name: &str, value: Option<Value>) -> SdkResult<()> {
        self.store.set(name, value)?;
        Ok(())
    }

    // ---- Typed accessors ----

    typed_accessors! {
        get_bool / set_bool: bool,
        get_char / set_char: char,
        get_sbyte / set_sbyte: i8,
        get_byte / set_byte: u8,
        get_int16 / set_int16: i16,
        get_uint16 / set_uint16: u16,
        get_int32 / set_int32: i32,
        get_uint32 / set_uint32: u32,
        get_int64 / set_int64: i64,
        get_uint64 / set_uint64: u64,
        get_double / set_double: f64,
        get_float / set_float: f32,
        get_decimal / set_decimal: Decimal,
        get_date_time / set_date_time: NaiveDateTime,
        get_rectangle / set_rectangle: Rectangle,
        get_point / set_point: Point,
        get_size / set_size: Size,
        get_size_f / set_size_f: SizeF,
    }

    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get(name, default.to_string())
    }

    pub fn set_string(&self, name: &str, value: &str) -> SdkResult<()> {
        self.set(name, value.to_string())
    }

    pub fn get_strings(&self, name: &str, default: &[String]) -> Vec<String> {
        self.get(name, default.to_vec())
    }

    pub fn set_strings(&self, name: &str, value: &[String]) -> SdkResult<()> {
        self.set(name, value.to_vec())
    }

    /// Byte arrays may have no default; then an absent value stays absent.
    pub fn get_byte_array(&self, name: &str, default: Option<&[u8]>) -> Option<Vec<u8>> {
        match default {
            Some(default) => Some(self.get(name, default.to_vec())),
            None => self.get_opt(name),
        }
    }

    pub fn set_byte_array(&self, name: &str, value: &[u8]) -> SdkResult<()> {
        self.set(name, value.to_vec())
    }

    /// Read an enum stored by its display name.
    ///
    /// Matching tries the stored text as-is, then its lowercase, uppercase,
    /// and capitalized spellings. An unparseable value is replaced by
    /// `default`'s display form.
    pub fn get_enum<E: FromStr + Display>(&self, name: &str, default: E) -> E {
        let stored = self
            .store
            .get(name, &ValueKind::String, Some(Value::String(default.to_string())));
        let Some(Value::String(text)) = stored else {
            return default;
        };
        match parse_ignoring_case(&text) {
            Some(value) => value,
            None => {
                debug!(name, stored = %text, "unrecognised enum value; resetting");
                if let Err(e) = self.set_string(name, &default.to_string()) {
                    warn!(name, error = %e, "could not reset enum value");
                }
                default
            }
        }
    }

    pub fn set_enum<E: Display>(&self, name: &str, value: &E) -> SdkResult<()> {
        self.set_string(name, &value.to_string())
    }

    /// Read any serde type stored through the structured (catch-all) path.
    pub fn get_structured<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        match self.store.get(name, &StructuredValue::kind_of::<T>(), None)? {
            Value::Structured(packed) => packed.unpack().ok(),
            _ => None,
        }
    }

    pub fn set_structured<T: Serialize>(&self, name: &str, value: &T) -> SdkResult<()> {
        let packed = StructuredValue::pack(value)?;
        self.store.set(name, Some(Value::Structured(packed)))?;
        Ok(())
    }

    // ---- Names and structure ----

    pub fn has_value(&self, name: &str) -> SdkResult<bool> {
        Ok(self.store.names()?.iter().any(|n| n == name))
    }

    pub fn names(&self) -> SdkResult<Vec<String>> {
        Ok(self.store.names()?)
    }

    pub fn unset(&self, name: &str) -> SdkResult<()> {
        self.store.unset(name)?;
        Ok(())
    }

    pub fn has_sub_settings(&self, name: &str) -> SdkResult<bool> {
        Ok(self.store.has_sub_settings(name)?)
    }

    /// Child node `name`, created if missing.
    pub fn sub_settings(&self, name: &str) -> SdkResult<Settings> {
        let child = self.store.sub_settings(name)?;
        Ok(Self {
            store: Arc::from(child),
        })
    }

    pub fn sub_setting_names(&self) -> SdkResult<Vec<String>> {
        Ok(self.store.sub_setting_names()?)
    }

    /// Remove the subtree `name` if it exists.
    pub fn unset_sub_settings_tree(&self, name: &str) -> SdkResult<()> {
        if self.store.has_sub_settings(name)? {
            self.store.unset_subtree(name)?;
        }
        Ok(())
    }

    pub fn batch_update(&self) -> BatchGuard {
        self.store.batch_update()
    }

    // ---- Copy ----

    /// Copy every value of `source` into this node.
    ///
    /// Values already present here are kept unless `overwrite`. With
    /// `recursive`, child nodes are copied the same way, created as needed.
    pub fn copy_from(&self, source: &Settings, recursive: bool, overwrite: bool) -> SdkResult<()> {
        let _batch = self.batch_update();
        let existing = self.names()?;
        for name in source.names()? {
            if !overwrite && existing.contains(&name) {
                continue;
            }
            if let Some(value) = source.get_value(&name)? {
                self.store.set(&name, Some(value))?;
            }
        }
        if recursive {
            for child in source.sub_setting_names()? {
                self.sub_settings(&child)?
                    .copy_from(&source.sub_settings(&child)?, true, overwrite)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

fn parse_ignoring_case<E: FromStr>(text: &str) -> Option<E> {
    let trimmed = text.trim();
    let mut capitalized = trimmed.to_ascii_lowercase();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    [
        trimmed.to_string(),
        trimmed.to_ascii_lowercase(),
        trimmed.to_ascii_uppercase(),
        capitalized,
    ]
    .iter()
    .find_map(|candidate| candidate.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Layout {
        Compact,
        Wide,
    }

    impl FromStr for Layout {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, ()> {
            match s {
                "Compact" => Ok(Self::Compact),
                "Wide" => Ok(Self::Wide),
                _ => Err(()),
            }
        }
    }

    impl Display for Layout {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(match self {
                Self::Compact => "Compact",
                Self::Wide => "Wide",
            })
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Recent {
        files: Vec<String>,
        pinned: bool,
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    #[test]
    fn typed_pairs_round_trip() {
        let settings = Settings::in_memory();
        settings.set_bool("enabled", true).unwrap();
        settings.set_double("ratio", 1234.5678).unwrap();
        settings.set_rectangle("bounds", Rectangle::new(1, 2, 3, 4)).unwrap();
        settings.set_uint16("port", 8080).unwrap();
        assert!(settings.get_bool("enabled", false));
        assert_eq!(settings.get_double("ratio", 0.0), 1234.5678);
        assert_eq!(
            settings.get_rectangle("bounds", Rectangle::default()),
            Rectangle::new(1, 2, 3, 4)
        );
        assert_eq!(settings.get_uint16("port", 0), 8080);
    }

    #[test]
    fn default_is_returned_and_persisted() {
        let settings = Settings::in_memory();
        assert_eq!(settings.get_int32("missing", 42), 42);
        assert_eq!(settings.get_value("missing").unwrap(), Some(Value::Int32(42)));
    }

    #[test]
    fn mismatched_kind_yields_default() {
        let settings = Settings::in_memory();
        settings.set_string("x", "seven").unwrap();
        assert_eq!(settings.get_int32("x", 7), 7);
    }

    #[test]
    fn string_lists_and_bytes() {
        let settings = Settings::in_memory();
        let recent = vec!["a.txt".to_string(), "b.txt".to_string()];
        settings.set_strings("recent", &recent).unwrap();
        assert_eq!(settings.get_strings("recent", &[]), recent);

        assert_eq!(settings.get_byte_array("blob", None), None);
        assert!(!settings.has_value("blob").unwrap());
        assert_eq!(
            settings.get_byte_array("blob", Some(&[1u8, 2, 3][..])),
            Some(vec![1, 2, 3])
        );
        assert!(settings.has_value("blob").unwrap());
    }

    #[test]
    fn enum_parsing_ignores_case_and_heals() {
        let settings = Settings::in_memory();
        settings.set_string("layout", "wide").unwrap();
        assert_eq!(settings.get_enum("layout", Layout::Compact), Layout::Wide);

        settings.set_string("layout", "sideways").unwrap();
        assert_eq!(settings.get_enum("layout", Layout::Compact), Layout::Compact);
        assert_eq!(settings.get_string("layout", ""), "Compact");

        settings.set_enum("layout", &Layout::Wide).unwrap();
        assert_eq!(settings.get_enum("layout", Layout::Compact), Layout::Wide);
    }

    /// Medium whose keys can be read but never written.
    struct ReadOnlyMedium(hive_hier::InMemoryMedium);

    impl hive_hier::HierarchicalMedium for ReadOnlyMedium {
        fn open_key(
            &self,
            path: &str,
            _writable: bool,
        ) -> hive_hier::MediumResult<Option<Box<dyn hive_hier::MediumKey>>> {
            hive_hier::HierarchicalMedium::open_key(&self.0, path, false)
        }

        fn create_key(&self, path: &str) -> hive_hier::MediumResult<Box<dyn hive_hier::MediumKey>> {
            Err(hive_hier::MediumError::ReadOnly(path.to_string()))
        }

        fn delete_key_tree(&self, path: &str) -> hive_hier::MediumResult<()> {
            Err(hive_hier::MediumError::ReadOnly(path.to_string()))
        }
    }

    #[test]
    fn enum_reset_failure_still_yields_default() {
        use hive_hier::{HierarchicalMedium, MediumKey};

        let inner = hive_hier::InMemoryMedium::new();
        let mut key = inner.create_key("App").unwrap();
        key.set_value("layout", hive_types::Primitive::Str("sideways".into()))
            .unwrap();
        drop(key);
        let settings = Settings::new(hive_hier::HierarchicalSettingsStore::new(
            Arc::new(ReadOnlyMedium(inner)),
            "App",
            hive_codec::CodecRegistry::shared(),
        ));

        assert_eq!(settings.get_enum("layout", Layout::Wide), Layout::Wide);
        assert_eq!(
            settings.get_value("layout").unwrap(),
            Some(Value::String("sideways".into()))
        );
    }

    #[test]
    fn structured_values_round_trip() {
        let settings = Settings::in_memory();
        let recent = Recent {
            files: vec!["notes.md".into()],
            pinned: true,
        };
        settings.set_structured("recent", &recent).unwrap();
        assert_eq!(settings.get_structured::<Recent>("recent"), Some(recent));
        assert_eq!(settings.get_structured::<Vec<u32>>("recent"), None);
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    #[test]
    fn unset_sub_settings_tree_when_absent_is_a_no_op() {
        let settings = Settings::in_memory();
        settings.unset_sub_settings_tree("nothing").unwrap();
        assert!(settings.sub_setting_names().unwrap().is_empty());
    }

    #[test]
    fn sub_settings_share_the_store() {
        let settings = Settings::in_memory();
        settings
            .sub_settings("ftp")
            .unwrap()
            .set_string("host", "example.com")
            .unwrap();
        let ftp = settings.sub_settings("ftp").unwrap();
        assert_eq!(ftp.get_string("host", ""), "example.com");
        settings.unset_sub_settings_tree("ftp").unwrap();
        assert!(!settings.has_sub_settings("ftp").unwrap());
    }

    // -----------------------------------------------------------------------
    // Copy
    // -----------------------------------------------------------------------

    fn copy_fixture() -> (Settings, Settings) {
        let source = Settings::in_memory();
        source.set_int32("shared", 1).unwrap();
        source.set_int32("only_source", 2).unwrap();
        let child = source.sub_settings("child").unwrap();
        child.set_string("deep", "from source").unwrap();

        let dest = Settings::in_memory();
        dest.set_int32("shared", 100).unwrap();
        dest.set_int32("only_dest", 3).unwrap();
        (source, dest)
    }

    #[test]
    fn copy_without_overwrite_keeps_existing_values() {
        let (source, dest) = copy_fixture();
        dest.copy_from(&source, true, false).unwrap();
        assert_eq!(dest.get_int32("shared", 0), 100);
        assert_eq!(dest.get_int32("only_source", 0), 2);
        assert_eq!(dest.get_int32("only_dest", 0), 3);
        assert_eq!(
            dest.sub_settings("child").unwrap().get_string("deep", ""),
            "from source"
        );
    }

    #[test]
    fn copy_with_overwrite_takes_source_values() {
        let (source, dest) = copy_fixture();
        dest.copy_from(&source, false, true).unwrap();
        assert_eq!(dest.get_int32("shared", 0), 1);
        assert!(!dest.has_sub_settings("child").unwrap());
    }
}
