pub mod store;

pub use store::{ConfigEntry, ConfigStore, ConfigStoreError, DEFAULT_TEMPLATE, parse_line};

use crate::models::FrontendSettings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the front-end's own settings.
pub const SETTINGS_FILE_NAME: &str = "cleanmodels-front.yaml";

/// Prefix of environment variables overriding settings (`CLEANMODELS_DEBUG_MODE=true`).
pub const ENV_PREFIX: &str = "CLEANMODELS";

/// Loads and saves [`FrontendSettings`].
///
/// Settings are layered: built-in defaults, then the YAML file (optional),
/// then `CLEANMODELS_*` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Manager for the settings file inside `dir`.
    pub fn new<P: AsRef<Utf8Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create settings directory: {}", dir))?;
        }

        Ok(Self {
            settings_path: dir.join(SETTINGS_FILE_NAME),
        })
    }

    /// Manager for an explicit settings file.
    pub fn with_settings_path<P: AsRef<Utf8Path>>(path: P) -> Self {
        Self {
            settings_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    /// Load settings. A missing file yields defaults.
    pub fn load_settings(&self) -> Result<FrontendSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let settings: FrontendSettings = config::Config::builder()
            .add_source(
                config::File::new(self.settings_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &FrontendSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }
}

/// Path of the tool's configuration file for the given settings.
pub fn tool_config_path(settings: &FrontendSettings) -> Utf8PathBuf {
    Utf8Path::new(&settings.work_dir).join(&settings.config_file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_settings_are_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let settings = manager.load_settings().unwrap();
        assert_eq!(settings.config_file_name, "last_dirs.pl");
        assert_eq!(settings.rescan_debounce_ms, 500);
    }

    #[test]
    fn test_save_load_round_trip() {
        let (manager, _temp_dir) = create_test_config_manager();

        let settings = FrontendSettings {
            tool_path: Some("/opt/cleanmodels/cleanmodels-cli".to_string()),
            debug_mode: true,
            watch_poll_interval_ms: 100,
            ..FrontendSettings::default()
        };
        manager.save_settings(&settings).unwrap();

        let loaded = manager.load_settings().unwrap();
        assert_eq!(loaded.tool_path, settings.tool_path);
        assert!(loaded.debug_mode);
        assert_eq!(loaded.watch_poll_interval_ms, 100);
    }

    #[test]
    fn test_tool_config_path() {
        let settings = FrontendSettings {
            work_dir: "/srv/models".to_string(),
            ..FrontendSettings::default()
        };
        assert_eq!(
            tool_config_path(&settings),
            Utf8PathBuf::from("/srv/models/last_dirs.pl")
        );
    }
}
