use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;

use crate::viewer::{DEFAULT_MAX_CANVAS_PIXELS, MAX_CACHE_SIZE, MIN_CACHE_SIZE};

const SETTINGS_FILENAME: &str = "viewer.yaml";
const LOG_FILENAME: &str = "pdf-page-viewer.log";
const APP_NAME: &str = "pdf-page-viewer";

/// Viewer configuration read from `viewer.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Pages kept rendered at once; values below 3 are raised to 3
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Cap on canvas backing store pixels before resolution is reduced;
    /// 0 means no cap
    #[serde(default = "default_max_canvas_pixels")]
    pub max_canvas_pixels: u64,

    #[serde(default = "default_document_url")]
    pub document_url: String,

    /// One of off, error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

fn default_max_cache_size() -> usize {
    MAX_CACHE_SIZE
}

fn default_max_canvas_pixels() -> u64 {
    DEFAULT_MAX_CANVAS_PIXELS
}

fn default_document_url() -> String {
    "https://localhost/placeholder.pdf".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            max_cache_size: default_max_cache_size(),
            max_canvas_pixels: default_max_canvas_pixels(),
            document_url: default_document_url(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// `<config dir>/pdf-page-viewer/viewer.yaml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

impl ViewerSettings {
    /// Loads settings from the user config directory, falling back to defaults
    pub fn load() -> Self {
        match config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            Some(path) => {
                info!("Settings file not found at {path:?}, using defaults");
                Self::default()
            }
            None => {
                warn!("Could not determine config directory, using default settings");
                Self::default()
            }
        }
    }

    /// Loads settings from `path`; unreadable or invalid files yield defaults
    pub fn load_from_path(path: &Path) -> Self {
        match Self::try_load_from_path(path) {
            Ok(settings) => {
                debug!("Loaded settings from {path:?}");
                settings
            }
            Err(e) => {
                error!("Failed to load settings from {path:?}: {e:#}");
                Self::default()
            }
        }
    }

    pub fn try_load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {path:?}"))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document is a valid file with every field defaulted.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse settings")
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
        let content = serde_yaml::to_string(self).context("Failed to serialize settings")?;
        fs::write(path, content).with_context(|| format!("Failed to save settings to {path:?}"))?;
        debug!("Saved settings to {path:?}");
        Ok(())
    }

    /// Cache capacity actually used by the viewer
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.max_cache_size.max(MIN_CACHE_SIZE)
    }

    /// Parsed `log_level`; unknown names fall back to `Info`
    #[must_use]
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            LevelFilter::Info
        })
    }

    /// Configured log file, or `<state dir>/pdf-page-viewer/pdf-page-viewer.log`
    pub fn resolve_log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log_file {
            return Ok(path.clone());
        }
        let base = dirs::state_dir()
            .or_else(dirs::cache_dir)
            .context("Could not determine state or cache directory")?;
        Ok(base.join(APP_NAME).join(LOG_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = ViewerSettings::from_yaml("max_cache_size: 4\n").unwrap();
        assert_eq!(settings.max_cache_size, 4);
        assert_eq!(settings.max_canvas_pixels, DEFAULT_MAX_CANVAS_PIXELS);
        assert_eq!(settings.document_url, "https://localhost/placeholder.pdf");
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(
            ViewerSettings::from_yaml("  \n").unwrap(),
            ViewerSettings::default()
        );
    }

    #[test]
    fn cache_size_is_clamped() {
        let settings = ViewerSettings {
            max_cache_size: 1,
            ..ViewerSettings::default()
        };
        assert_eq!(settings.cache_size(), MIN_CACHE_SIZE);
        assert_eq!(ViewerSettings::default().cache_size(), MAX_CACHE_SIZE);
    }

    #[test]
    fn level_filter_parses_names() {
        let mut settings = ViewerSettings {
            log_level: "debug".to_string(),
            ..ViewerSettings::default()
        };
        assert_eq!(settings.level_filter(), LevelFilter::Debug);
        settings.log_level = "loud".to_string();
        assert_eq!(settings.level_filter(), LevelFilter::Info);
    }

    #[test]
    fn explicit_log_file_wins() {
        let settings = ViewerSettings {
            log_file: Some(PathBuf::from("/tmp/viewer.log")),
            ..ViewerSettings::default()
        };
        assert_eq!(
            settings.resolve_log_path().unwrap(),
            PathBuf::from("/tmp/viewer.log")
        );
    }
}
