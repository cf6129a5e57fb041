// Application configuration
// JSON settings file with per-field defaults; read once at startup

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the settings file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "voicecmd.json";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Process-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Clip length in seconds every signal is truncated or padded to
    /// Must match the duration the artifacts were produced with
    pub target_duration_seconds: f64,

    /// Serialized classifier artifact
    pub model_path: PathBuf,

    /// Serialized feature-scaler artifact
    pub scaler_path: PathBuf,

    /// Feature configuration; built-in statistical set when absent
    pub feature_config_path: Option<PathBuf>,

    /// Resample decoded audio to this rate before normalization
    pub resample_rate_hz: Option<u32>,

    /// Expected SHA-256 (hex) of the classifier artifact
    pub model_sha256: Option<String>,

    /// Expected SHA-256 (hex) of the scaler artifact
    pub scaler_sha256: Option<String>,

    /// Append-only JSONL trace of pipeline stages
    pub trace_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            target_duration_seconds: 2.0,
            model_path: PathBuf::from("model_randomforest.json"),
            scaler_path: PathBuf::from("scaler.json"),
            feature_config_path: None,
            resample_rate_hz: None,
            model_sha256: None,
            scaler_sha256: None,
            trace_path: None,
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, or the first settings file found, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        let config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// ./voicecmd.json, then <config_dir>/voicecmd/config.json
    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("voicecmd").join("config.json"))
            .filter(|path| path.is_file())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let data = std::fs::read(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json_bytes(&data).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if !self.target_duration_seconds.is_finite() || self.target_duration_seconds <= 0.0 {
            return Err(ConfigLoadError::Invalid {
                field: "target_duration_seconds".to_string(),
                reason: format!(
                    "must be a positive number of seconds, got {}",
                    self.target_duration_seconds
                ),
            });
        }

        if self.resample_rate_hz == Some(0) {
            return Err(ConfigLoadError::Invalid {
                field: "resample_rate_hz".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        for (field, digest) in [
            ("model_sha256", &self.model_sha256),
            ("scaler_sha256", &self.scaler_sha256),
        ] {
            if let Some(digest) = digest {
                if digest.len() != 64 || hex::decode(digest).is_err() {
                    return Err(ConfigLoadError::Invalid {
                        field: field.to_string(),
                        reason: "must be a 64 character hex SHA-256 digest".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
