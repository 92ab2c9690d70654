//! TOML configuration stored in the application root.
//!
//! Every field carries a serde default so partial or older files still load.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::geo;
use crate::grid::MAX_GRID_SIZE;
use crate::model::ModelVariant;
use crate::report::{DEFAULT_MAX_FINDINGS, DEFAULT_WEAK_THRESHOLD_DBM, ReportOptions};

/// File name of the settings file inside the app root.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// File name of the persisted model artifact.
pub const MODEL_FILE_NAME: &str = "wifi_predictor.json";
/// File name of the SQLite sample log.
pub const SAMPLE_LOG_FILE_NAME: &str = "wifi_samples.db";

const DEFAULT_GRID_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not resolve application directory: {0}")]
    AppDir(#[from] AppDirError),
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config for {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// All user-tunable settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub prediction: PredictionSettings,
    #[serde(default)]
    pub report: ReportSettings,
    #[serde(default)]
    pub geolocation: GeolocationSettings,
}

/// Optional storage overrides; unset entries resolve inside the app root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default)]
    pub sample_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// `ensemble` or `neural`; anything else means `ensemble`.
    #[serde(default = "default_variant")]
    pub variant: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            variant: default_variant(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSettings {
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_weak_threshold")]
    pub weak_threshold_dbm: f64,
    #[serde(default = "default_max_findings")]
    pub max_findings: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            weak_threshold_dbm: default_weak_threshold(),
            max_findings: default_max_findings(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for GeolocationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
        }
    }
}

fn default_variant() -> String {
    ModelVariant::Ensemble.as_str().to_string()
}

fn default_grid_size() -> usize {
    DEFAULT_GRID_SIZE
}

fn default_weak_threshold() -> f64 {
    DEFAULT_WEAK_THRESHOLD_DBM
}

fn default_max_findings() -> usize {
    DEFAULT_MAX_FINDINGS
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    geo::DEFAULT_ENDPOINT.to_string()
}

impl AppConfig {
    pub fn variant(&self) -> ModelVariant {
        ModelVariant::parse_or_default(&self.model.variant)
    }

    /// Configured grid size clamped to `1..=MAX_GRID_SIZE`.
    pub fn grid_size(&self) -> usize {
        clamp_grid_size(self.prediction.grid_size)
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            weak_threshold_dbm: self.report.weak_threshold_dbm,
            max_findings: self.report.max_findings,
        }
    }

    /// Where the model artifact lives.
    pub fn model_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.paths.model_path {
            return Ok(path.clone());
        }
        Ok(self.storage_dir(app_dirs::models_dir)?.join(MODEL_FILE_NAME))
    }

    /// Where the SQLite sample log lives.
    pub fn sample_log_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.paths.sample_log_path {
            return Ok(path.clone());
        }
        Ok(self.storage_dir(app_dirs::data_dir)?.join(SAMPLE_LOG_FILE_NAME))
    }

    fn storage_dir(
        &self,
        fallback: fn() -> Result<PathBuf, AppDirError>,
    ) -> Result<PathBuf, ConfigError> {
        match &self.paths.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(fallback()?),
        }
    }
}

/// Clamp a requested grid size into the supported range.
pub fn clamp_grid_size(requested: usize) -> usize {
    requested.clamp(1, MAX_GRID_SIZE)
}

/// Resolve the configuration file path inside the app root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app root, returning defaults if missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Load configuration from `path`, returning defaults if missing.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Save configuration to the app root.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_to_path(config, &config_path()?)
}

/// Write `config` to `path` atomically, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".wifimap-config")
        .tempfile_in(&dir)
        .map_err(write_err)?;
    temp.write_all(data.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
