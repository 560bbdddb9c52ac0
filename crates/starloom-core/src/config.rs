//! Engine configuration loaded from `starloom.yaml`.
//!
//! The file lives in the configuration directory (`--config <dir>`, by
//! default the working directory). A missing file means every default.
//! Environment variables override a few values:
//!
//! - `STARLOOM_RESOURCES` overrides `resources`

use std::path::{Path, PathBuf};

use serde::Deserialize;
use starloom_types::DateFormat;

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "starloom.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Seed for every random draw. Zero seeds from the clock.
    #[serde(default)]
    pub seed: u64,

    /// How dates are written for the player.
    #[serde(default)]
    pub date_format: DateFormat,

    /// Base resource directory. Its `data/` subdirectory is loaded first.
    #[serde(default = "default_resources")]
    pub resources: PathBuf,

    /// Enabled plugin directory names, in load order. Empty enables every
    /// plugin found, sorted by name.
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Extra directories to search for plugins, after `<config>/plugins`.
    #[serde(default)]
    pub plugin_dirs: Vec<PathBuf>,

    /// Save directory. Defaults to `<config>/saves`.
    #[serde(default)]
    pub saves: Option<PathBuf>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            date_format: DateFormat::default(),
            resources: default_resources(),
            plugins: Vec::new(),
            plugin_dirs: Vec::new(),
            saves: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            let mut config = Self::default();
            config.apply_env_overrides();
            return Ok(config);
        }
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load `starloom.yaml` from `config_dir`, or defaults if there is none.
    ///
    /// Relative `resources`, `plugin_dirs` and `saves` paths are resolved
    /// against `config_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.is_file() {
            tracing::debug!(path = %path.display(), "loading engine config");
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no engine config, using defaults");
            Self::parse("")?
        };
        config.resolve_paths(config_dir);
        Ok(config)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("STARLOOM_RESOURCES") {
            self.resources = PathBuf::from(val);
        }
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        if self.resources.is_relative() {
            self.resources = config_dir.join(&self.resources);
        }
        for dir in &mut self.plugin_dirs {
            if dir.is_relative() {
                *dir = config_dir.join(&*dir);
            }
        }
        let saves = self
            .saves
            .take()
            .unwrap_or_else(|| PathBuf::from("saves"));
        self.saves = Some(if saves.is_relative() {
            config_dir.join(saves)
        } else {
            saves
        });
    }

    /// The save directory.
    pub fn saves_dir(&self) -> PathBuf {
        self.saves.clone().unwrap_or_else(|| PathBuf::from("saves"))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_resources() -> PathBuf {
    PathBuf::from("resources")
}

fn default_log_level() -> String {
    "info".to_owned()
}
