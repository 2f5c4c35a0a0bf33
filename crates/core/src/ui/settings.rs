//! User settings persistence and UI configuration.
//!
//! The viewer remembers the detection service address, transport and
//! confidence bands between runs. Nothing about past requests is stored.

use crate::config::{ConfidenceThresholds, Config, ConfigBuilder, ConfigOverrides, TransportMode};
use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// User-configurable settings persisted between sessions.
///
/// Settings are stored as JSON in the user's config directory
/// (e.g., `~/.config/plate-vision/settings.json` on Linux).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the detection service.
    pub service_endpoint: String,
    /// Wire format for uploads.
    #[serde(default)]
    pub transport_mode: TransportMode,
    /// Confidence bands for box colors and quality badges.
    #[serde(default)]
    pub confidence_thresholds: ConfidenceThresholds,
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "plate-vision").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to the given configuration.
    pub fn load(config: &Config) -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path, config))
            .unwrap_or_else(|| Self::from_config(config))
    }

    /// Loads settings from a specific file, falling back to the configuration
    /// if the file is missing or unreadable.
    pub fn load_from(path: &Path, config: &Config) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_else(|| {
                debug!(path = %path.display(), "No stored settings, using configuration");
                Self::from_config(config)
            })
    }

    /// Creates settings mirroring a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            service_endpoint: config.service_endpoint.to_string(),
            transport_mode: config.transport_mode,
            confidence_thresholds: config.confidence_thresholds,
        }
    }

    /// Persists settings to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Layers these settings over a base configuration and validates them.
    pub fn apply(&self, base: &Config) -> Result<Config> {
        self.apply_under(base, &ConfigOverrides::default())
    }

    /// Like [`Settings::apply`], but fields set in `overrides` (environment
    /// or command line) win over the stored values.
    pub fn apply_under(&self, base: &Config, overrides: &ConfigOverrides) -> Result<Config> {
        let builder = ConfigBuilder::from(base.clone())
            .with_endpoint(&self.service_endpoint)
            .with_transport(self.transport_mode)
            .with_thresholds(self.confidence_thresholds);
        overrides.apply_to(builder).build()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            service_endpoint: "http://10.0.0.7:8000/".to_string(),
            transport_mode: TransportMode::EncodedJson,
            confidence_thresholds: ConfidenceThresholds::new(0.9, 0.6).unwrap(),
        };

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path, &Config::default());

        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_or_corrupt_file_falls_back_to_config() {
        let dir = tempdir().unwrap();
        let config = Config::builder().with_transport(TransportMode::EncodedJson).build().unwrap();

        let missing = Settings::load_from(&dir.path().join("nope.json"), &config);
        assert_eq!(missing, Settings::from_config(&config));

        let corrupt = dir.path().join("settings.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&corrupt, &config), Settings::from_config(&config));
    }

    #[test]
    fn apply_overrides_and_validates() {
        let base = Config::builder().with_display_size(800, 600).build().unwrap();
        let mut settings = Settings::from_config(&base);
        settings.service_endpoint = "https://plates.example.com".to_string();
        settings.transport_mode = TransportMode::EncodedJson;

        let config = settings.apply(&base).unwrap();
        assert_eq!(config.service_endpoint.as_str(), "https://plates.example.com/");
        assert_eq!(config.transport_mode, TransportMode::EncodedJson);
        assert_eq!(config.display_size, (800, 600));

        settings.confidence_thresholds = ConfidenceThresholds { high: 0.2, medium: 0.9 };
        assert!(settings.apply(&base).is_err());
    }

    #[test]
    fn explicit_overrides_beat_stored_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings {
            service_endpoint: "http://stored:8000/".to_string(),
            transport_mode: TransportMode::EncodedJson,
            confidence_thresholds: ConfidenceThresholds::new(0.9, 0.6).unwrap(),
        }
        .save_to(&path)
        .unwrap();

        let overrides = ConfigOverrides {
            endpoint: Some("http://cli-override:9000".to_string()),
            ..Default::default()
        };
        let base = overrides.apply_to(Config::builder()).build().unwrap();

        let effective = Settings::load_from(&path, &base).apply_under(&base, &overrides).unwrap();
        assert_eq!(effective.service_endpoint.as_str(), "http://cli-override:9000/");
        // Fields without an override still come from the stored settings
        assert_eq!(effective.transport_mode, TransportMode::EncodedJson);
        assert!((effective.confidence_thresholds.high - 0.9).abs() < 1e-9);
    }
}
