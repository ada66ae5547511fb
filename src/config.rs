use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR_NAME: &str = "spotify-music-importer";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings read from `<config dir>/spotify-music-importer/config.json`.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    /// Explicit path to the spotdl executable. Looked up automatically when unset.
    pub spotdl_path: Option<PathBuf>,
    pub output_format: String,
    pub download_threads: u32,
    pub delete_after_import: bool,
    /// Name of the media player application that scripts talk to.
    pub music_app: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            spotdl_path: None,
            output_format: "mp3".to_string(),
            download_threads: 4,
            delete_after_import: true,
            music_app: "Music".to_string(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the user's config, falling back to defaults when the file is absent or broken.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Music")
        .join("Spotify Downloads")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.output_dir.ends_with("Music/Spotify Downloads"));
        assert_eq!(config.output_format, "mp3");
        assert_eq!(config.download_threads, 4);
        assert!(config.delete_after_import);
        assert_eq!(config.music_app, "Music");
        assert!(config.spotdl_path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "delete_after_import": false, "spotdl_path": "/opt/spotdl" }"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(!config.delete_after_import);
        assert_eq!(config.spotdl_path, Some(PathBuf::from("/opt/spotdl")));
        assert_eq!(config.download_threads, 4);
        assert_eq!(config.music_app, "Music");
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_matches!(AppConfig::load_from(&path), Err(ConfigError::Parse(_)));
        assert_matches!(
            AppConfig::load_from(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        );
    }
}
