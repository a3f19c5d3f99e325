//! Configuration file loader.

use std::path::PathBuf;

use super::types::{InvalidConfig, RoovisionConfig};

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .roovision.toml
        search_paths.push(PathBuf::from(".roovision.toml"));

        // 2. User config directory: ~/.config/roovision/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("roovision").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// The result is not validated; call [`RoovisionConfig::validate`] after
    /// applying any overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(&self) -> Result<RoovisionConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(RoovisionConfig::default())
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &PathBuf) -> Result<RoovisionConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Mode;
    use tempfile::TempDir;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".roovision.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config, RoovisionConfig::default());
        assert!(loader.find_config_file().is_none());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_str = r#"
            tasks_path = "/data/tasks"
            max_read_bytes = 1024
            log_rotation_count = 5
            skip_modes = ["ask", "architect"]
        "#;

        let config: RoovisionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tasks_path, PathBuf::from("/data/tasks"));
        assert_eq!(config.max_read_bytes, 1024);
        assert_eq!(config.log_rotation_count, 5);
        assert_eq!(config.skip_modes, vec![Mode::Ask, Mode::Architect]);
        // Unset fields keep their defaults.
        assert_eq!(config.lookahead_bytes, 512 * 1024);
    }

    #[test]
    fn test_negative_value_fails_to_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_read_bytes = -5\n").unwrap();

        let result = ConfigLoader::with_path(path).load();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "debounce_ms = 250\nskip_modes = []\n").unwrap();

        let loader = ConfigLoader::with_path(path.clone());
        let config = loader.load().unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert!(config.skip_modes.is_empty());
        assert_eq!(loader.find_config_file(), Some(path));
    }

    #[test]
    fn test_invalid_config_converts() {
        let config = RoovisionConfig {
            lookahead_bytes: 0,
            ..Default::default()
        };
        let err: ConfigError = config.validate().unwrap_err().into();
        assert!(err.to_string().contains("lookahead_bytes"));
    }
}
