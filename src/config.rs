use crate::constants::{APP_ID, DEFAULT_FFMPEG_BINARY, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub download_dir: Option<PathBuf>,
    pub ffmpeg_path: PathBuf,
    pub last_input_dir: Option<PathBuf>,
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG_BINARY),
            last_input_dir: None,
            window_width: 1000.0,
            window_height: 700.0,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join("config.json"))
    }

    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("Could not determine config directory, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("Config file doesn't exist, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Config loaded from: {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file, using defaults: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!("Config saved to: {:?}", path);
        Ok(())
    }

    /// Configured directory, then the user's download folder, then the cwd.
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Sizes below the window minimum (e.g. while minimized) are ignored.
    pub fn remember_window_size(&mut self, width: f32, height: f32) {
        if width >= MIN_WINDOW_WIDTH && height >= MIN_WINDOW_HEIGHT {
            self.window_width = width;
            self.window_height = height;
        }
    }

    pub fn update_last_input_dir(&mut self, file: &Path) {
        if let Some(parent) = file.parent() {
            self.last_input_dir = Some(parent.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.download_dir = Some(dir.path().join("out"));
        config.update_last_input_dir(&dir.path().join("in").join("clip.mov"));
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.last_input_dir, Some(dir.path().join("in")));
        assert_eq!(loaded.resolved_download_dir(), dir.path().join("out"));
    }

    #[test]
    fn test_window_size_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.remember_window_size(1280.0, 800.0);
        config.remember_window_size(0.0, 0.0);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!((loaded.window_width, loaded.window_height), (1280.0, 800.0));
    }

    #[test]
    fn test_missing_or_broken_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            AppConfig::load_from(&dir.path().join("absent.json")),
            AppConfig::default()
        );

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert_eq!(AppConfig::load_from(&broken), AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "ffmpeg_path": "/opt/ffmpeg/bin/ffmpeg" }"#).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(loaded.window_width, AppConfig::default().window_width);
    }
}
