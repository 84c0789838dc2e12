//! Persisted configuration
//!
//! A small YAML file in the user config directory holding the ambient
//! choices: audio device selection and interpolation quality. The engine's
//! DSP constants (echo time and feedback, grain length, transition window)
//! are part of its character and are deliberately not configurable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::InterpolationMethod;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audio output settings
    pub audio: AudioConfig,
    /// Interpolation quality for transport and grain reads
    pub interpolation: InterpolationMethod,
}

impl Config {
    /// Default config file location (None if no config directory exists)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("crossdeck").join("config.yaml"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Save to the default location, creating the directory if needed
    pub fn save(&self) -> Result<()> {
        let path = Self::path().context("no config directory available")?;
        self.save_to(&path)
    }

    /// Save to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let text = serde_yaml::to_string(self).context("serializing config")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "crossdeck-config-test-{}.yaml",
            std::process::id()
        ));

        let config = Config {
            audio: AudioConfig {
                device: Some("Speakers".into()),
                buffer_size: Some(512),
            },
            interpolation: InterpolationMethod::Linear,
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_parse_partial_yaml() {
        // Missing fields fall back to defaults
        let config: Config = serde_yaml::from_str("interpolation: linear\n").unwrap();
        assert_eq!(config.interpolation, InterpolationMethod::Linear);
        assert_eq!(config.audio, AudioConfig::default());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.interpolation, InterpolationMethod::Cubic);
        assert_eq!(config.audio.device, None);
    }
}
