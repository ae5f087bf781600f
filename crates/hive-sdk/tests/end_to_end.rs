use std::sync::Arc;

use hive_sdk::{
    CodecRegistry, DirectoryMedium, FileSettingsStore, FileStoreOptions,
    HierarchicalSettingsStore, InMemoryMedium, Rectangle, Settings, StoreSpec, Value,
};
use hive_types::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WindowState {
    maximized: bool,
    monitor: String,
}

fn file_settings(path: &std::path::Path) -> (Arc<FileSettingsStore>, Settings) {
    let store = Arc::new(FileSettingsStore::open(path, &FileStoreOptions::default()).unwrap());
    let settings = Settings::from_shared(store.clone());
    (store, settings)
}

#[test]
fn file_store_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.xml");

    let (store, settings) = file_settings(&path);
    settings.set_int32("retries", 5).unwrap();
    settings
        .sub_settings("ftp")
        .unwrap()
        .set_string("host", "example.com")
        .unwrap();
    drop(settings);
    Arc::try_unwrap(store).unwrap().close().unwrap();

    let (_store, settings) = file_settings(&path);
    assert_eq!(settings.get_int32("retries", -1), 5);
    assert_eq!(
        settings.sub_settings("ftp").unwrap().get_string("host", ""),
        "example.com"
    );
}

#[test]
fn every_kind_survives_the_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kinds.xml");
    let state = WindowState {
        maximized: true,
        monitor: "DISPLAY2".into(),
    };

    {
        let (_store, settings) = file_settings(&path);
        let _batch = settings.batch_update();
        settings.set_char("sep", ';').unwrap();
        settings.set_bool("enabled", false).unwrap();
        settings.set_sbyte("tiny", -5).unwrap();
        settings.set_uint64("huge", u64::MAX).unwrap();
        settings.set_double("ratio", 0.1).unwrap();
        settings.set_float("scale", 1.5).unwrap();
        settings
            .set_rectangle("bounds", Rectangle::new(-10, 20, 800, 600))
            .unwrap();
        settings
            .set_strings("recent", &["a,b".to_string(), "c".to_string()])
            .unwrap();
        settings.set_byte_array("blob", &[1, 2, 3, 4, 5]).unwrap();
        settings.set_structured("window", &state).unwrap();
    }

    let (_store, settings) = file_settings(&path);
    assert_eq!(settings.get_char("sep", ' '), ';');
    assert!(!settings.get_bool("enabled", true));
    assert_eq!(settings.get_sbyte("tiny", 0), -5);
    assert_eq!(settings.get_uint64("huge", 0), u64::MAX);
    assert_eq!(settings.get_double("ratio", 0.0), 0.1);
    assert_eq!(settings.get_float("scale", 0.0), 1.5);
    assert_eq!(
        settings.get_rectangle("bounds", Rectangle::default()),
        Rectangle::new(-10, 20, 800, 600)
    );
    assert_eq!(settings.get_strings("recent", &[]), vec!["a,b", "c"]);
    assert_eq!(
        settings.get_byte_array("blob", None),
        Some(vec![1, 2, 3, 4, 5])
    );
    assert_eq!(settings.get_structured::<WindowState>("window"), Some(state));
}

#[test]
fn directory_medium_round_trips_through_the_codecs() {
    let dir = tempfile::tempdir().unwrap();
    let medium = Arc::new(DirectoryMedium::open(dir.path().join("registry")).unwrap());
    let codecs = CodecRegistry::shared();

    let settings = Settings::new(HierarchicalSettingsStore::new(
        medium.clone(),
        "Software\\Hive",
        codecs.clone(),
    ));
    settings.set_int32("retries", 5).unwrap();
    settings.set_bool("enabled", true).unwrap();
    settings
        .set_rectangle("bounds", Rectangle::new(1, 2, 3, 4))
        .unwrap();
    settings.set_byte_array("blob", &[1, 2, 3, 4, 5]).unwrap();
    settings
        .sub_settings("ftp")
        .unwrap()
        .set_string("host", "example.com")
        .unwrap();

    let reopened = hive_sdk::open_first_existing(
        &[
            StoreSpec::new(medium.clone(), "Software\\Hive2"),
            StoreSpec::new(medium.clone(), "Software\\Hive").requiring("retries"),
        ],
        &codecs,
    )
    .unwrap();
    assert_eq!(reopened.get_int32("retries", 0), 5);
    assert!(reopened.get_bool("enabled", false));
    assert_eq!(
        reopened.get_rectangle("bounds", Rectangle::default()),
        Rectangle::new(1, 2, 3, 4)
    );
    assert_eq!(
        reopened.get_byte_array("blob", None),
        Some(vec![1, 2, 3, 4, 5])
    );
    assert_eq!(reopened.sub_setting_names().unwrap(), vec!["ftp"]);
}

#[test]
fn copy_between_media() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = Settings::new(HierarchicalSettingsStore::new(
        Arc::new(InMemoryMedium::new()),
        "Legacy",
        CodecRegistry::shared(),
    ));
    let saved_at: NaiveDateTime = "2024-05-06T07:08:09.123456789".parse().unwrap();
    legacy.set_string("theme", "dark").unwrap();
    legacy.set_int32("retries", 3).unwrap();
    legacy.set_bool("enabled", true).unwrap();
    legacy.set_double("ratio", 0.5).unwrap();
    legacy.set_date_time("saved_at", saved_at).unwrap();
    legacy
        .sub_settings("ftp")
        .unwrap()
        .set_string("host", "old.example.com")
        .unwrap();

    let (_store, current) = file_settings(&dir.path().join("current.xml"));
    current.set_int32("retries", 9).unwrap();
    current.copy_from(&legacy, true, false).unwrap();

    assert_eq!(current.get_string("theme", ""), "dark");
    assert_eq!(current.get_int32("retries", 0), 9);
    assert!(current.get_bool("enabled", false));
    assert_eq!(current.get_double("ratio", 0.0), 0.5);
    assert_eq!(current.get_date_time("saved_at", NaiveDateTime::MIN), saved_at);
    assert_eq!(current.get_value("enabled").unwrap(), Some(Value::Bool(true)));
    assert_eq!(
        current.sub_settings("ftp").unwrap().get_string("host", ""),
        "old.example.com"
    );
}

#[test]
fn copy_from_a_reopened_directory_medium_keeps_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("registry");
    {
        let medium = Arc::new(DirectoryMedium::open(&root).unwrap());
        let legacy = Settings::new(HierarchicalSettingsStore::new(
            medium,
            "App",
            CodecRegistry::shared(),
        ));
        legacy.set_bool("enabled", true).unwrap();
        legacy.set_float("zoom", 1.5).unwrap();
        legacy.set_uint16("port", 2121).unwrap();
    }

    let medium = Arc::new(DirectoryMedium::open(&root).unwrap());
    let legacy = Settings::new(HierarchicalSettingsStore::new(
        medium,
        "App",
        CodecRegistry::shared(),
    ));
    let current = Settings::in_memory();
    current.copy_from(&legacy, false, true).unwrap();
    assert_eq!(current.get_value("enabled").unwrap(), Some(Value::Bool(true)));
    assert_eq!(current.get_value("zoom").unwrap(), Some(Value::Float(1.5)));
    assert_eq!(current.get_value("port").unwrap(), Some(Value::UInt16(2121)));
}

#[test]
fn single_empty_string_list_survives_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lists.xml");

    let (store, settings) = file_settings(&path);
    settings.set_strings("one_blank", &[String::new()]).unwrap();
    settings.set_strings("none", &[]).unwrap();
    drop(settings);
    Arc::try_unwrap(store).unwrap().close().unwrap();

    let (_store, reopened) = file_settings(&path);
    let fallback = vec!["default".to_string()];
    assert_eq!(reopened.get_strings("one_blank", &fallback), vec![String::new()]);
    assert_eq!(reopened.get_strings("none", &fallback), Vec::<String>::new());
}
