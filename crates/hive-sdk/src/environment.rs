//! The two root settings files of an application.
//!
//! An application keeps per-user settings and per-machine settings in two
//! single-file stores under one data directory. [`EnvironmentConfig`] names
//! them; [`SettingsEnvironment`] opens them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hive_file::{FileSettingsStore, FileStoreOptions};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SdkResult;
use crate::settings::Settings;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub data_dir: PathBuf,
    pub user_settings_file: String,
    pub machine_settings_file: String,
    pub create_if_missing: bool,
    pub sync_on_write: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            user_settings_file: "user_settings.xml".into(),
            machine_settings_file: "machine_settings.xml".into(),
            create_if_missing: true,
            sync_on_write: false,
        }
    }
}

impl EnvironmentConfig {
    /// Defaults with `data_dir` replaced.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn user_settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.user_settings_file)
    }

    pub fn machine_settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.machine_settings_file)
    }

    pub fn file_options(&self) -> FileStoreOptions {
        FileStoreOptions {
            create_if_missing: self.create_if_missing,
            sync_on_write: self.sync_on_write,
        }
    }
}

/// User and machine settings, opened together.
pub struct SettingsEnvironment {
    config: EnvironmentConfig,
    user_store: Arc<FileSettingsStore>,
    machine_store: Arc<FileSettingsStore>,
    user: Settings,
    machine: Settings,
}

impl SettingsEnvironment {
    /// Create the data directory if needed and open both settings files.
    pub fn open(config: EnvironmentConfig) -> SdkResult<Self> {
        if config.create_if_missing {
            fs::create_dir_all(&config.data_dir)?;
        }
        let options = config.file_options();
        let user_store = Arc::new(FileSettingsStore::open(config.user_settings_path(), &options)?);
        let machine_store =
            Arc::new(FileSettingsStore::open(config.machine_settings_path(), &options)?);
        info!(data_dir = %config.data_dir.display(), "settings environment ready");
        Ok(Self {
            user: Settings::from_shared(user_store.clone()),
            machine: Settings::from_shared(machine_store.clone()),
            user_store,
            machine_store,
            config,
        })
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Per-user settings.
    pub fn user(&self) -> &Settings {
        &self.user
    }

    /// Per-machine settings.
    pub fn machine(&self) -> &Settings {
        &self.machine
    }

    /// Flush and close both files. Handles cloned out of the environment
    /// keep their store open until they are dropped.
    pub fn close(self) -> SdkResult<()> {
        let Self {
            user,
            machine,
            user_store,
            machine_store,
            ..
        } = self;
        drop(user);
        drop(machine);
        for store in [user_store, machine_store] {
            if let Ok(store) = Arc::try_unwrap(store) {
                store.close()?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SettingsEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsEnvironment")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = EnvironmentConfig::default();
        assert_eq!(c.user_settings_file, "user_settings.xml");
        assert_eq!(c.machine_settings_file, "machine_settings.xml");
        assert!(c.create_if_missing);
        assert!(!c.sync_on_write);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = EnvironmentConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/app"
            sync_on_write = true
            "#,
        )
        .unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/app"));
        assert!(c.sync_on_write);
        assert_eq!(c.user_settings_path(), PathBuf::from("/var/lib/app/user_settings.xml"));
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = EnvironmentConfig::from_toml_str("data_dir = [").unwrap_err();
        assert!(matches!(err, crate::SdkError::Config(_)));
    }

    #[test]
    fn opens_both_files_in_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = EnvironmentConfig::in_dir(dir.path().join("nested"));
        let env = SettingsEnvironment::open(config.clone()).unwrap();
        env.user().set_string("theme", "dark").unwrap();
        env.machine().set_int32("cpus", 8).unwrap();
        env.close().unwrap();

        assert!(config.user_settings_path().is_file());
        assert!(config.machine_settings_path().is_file());

        let env = SettingsEnvironment::open(config).unwrap();
        assert_eq!(env.user().get_string("theme", ""), "dark");
        assert_eq!(env.machine().get_int32("cpus", 0), 8);
        assert!(!env.user().has_value("cpus").unwrap());
    }
}
