//! Service configuration - every tunable as a TOML value
//!
//! Each section implements `Default` with the values in [`super::defaults`],
//! so a missing file or a partial file behaves exactly like the built-in setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "POSE_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pose_backend.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one service instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Pose model selection and tuning
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Image decoding limits
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Detection record storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Request pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl ServiceConfig {
    /// Load configuration using the standard search order, then apply
    /// environment overrides.
    ///
    /// An explicitly requested file must load. Files found through
    /// `$POSE_CONFIG` or the working directory fall back to defaults on error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                let config = Self::load_from_file(path)?;
                info!(path = %path.display(), "Loaded config from --config");
                config
            }
            None => Self::discover(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn discover() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from POSE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from POSE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "POSE_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./pose_backend.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Apply `PORT` and `POSE_MODEL_PATH` using the given lookup.
    ///
    /// `PORT` replaces only the port of `server.addr`, keeping the host.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.trim().is_empty()) {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    let host = self
                        .server
                        .addr
                        .rsplit_once(':')
                        .map_or("0.0.0.0", |(host, _)| host);
                    self.server.addr = format!("{host}:{port}");
                }
                Err(e) => warn!(value = %port, error = %e, "Ignoring invalid PORT"),
            }
        }
        if let Some(path) = lookup("POSE_MODEL_PATH").filter(|p| !p.trim().is_empty()) {
            self.estimator.model_path = PathBuf::from(path);
        }
    }

    /// Check cross-field constraints, collecting every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        match self.server.addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => errors.push(format!(
                "server.addr: expected HOST:PORT, got {:?}",
                self.server.addr
            )),
        }
        if self.server.max_upload_bytes == 0 {
            errors.push("server.max_upload_bytes must be > 0".to_string());
        }

        let e = &self.estimator;
        if e.input_name.trim().is_empty() {
            errors.push("estimator.input_name must not be empty".to_string());
        }
        if e.output_name.trim().is_empty() {
            errors.push("estimator.output_name must not be empty".to_string());
        }
        if e.input_size == 0 {
            errors.push("estimator.input_size must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&e.min_pose_score) {
            errors.push(format!(
                "estimator.min_pose_score ({:.3}) must be within [0, 1]",
                e.min_pose_score
            ));
        }
        if e.intra_threads == 0 {
            errors.push("estimator.intra_threads must be >= 1".to_string());
        }

        if self.decoder.max_pixels == 0 {
            errors.push("decoder.max_pixels must be > 0".to_string());
        }

        if self.storage.backend == StorageBackend::Sled
            && self.storage.path.as_os_str().is_empty()
        {
            errors.push("storage.path must be set for the sled backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, `HOST:PORT`
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Largest accepted request body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_addr() -> String {
    format!("0.0.0.0:{}", defaults::SERVER_PORT)
}
fn default_max_upload_bytes() -> usize {
    defaults::MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// ============================================================================
// Estimator
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Path to the single-person model file
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[serde(default = "default_input_name")]
    pub input_name: String,

    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Square model input resolution
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Mean keypoint score below which no pose is reported
    #[serde(default = "default_min_pose_score")]
    pub min_pose_score: f32,

    /// Intra-op CPU threads for the inference session
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_model_path() -> PathBuf {
    PathBuf::from(defaults::MODEL_PATH)
}
fn default_input_name() -> String {
    defaults::MODEL_INPUT_NAME.to_string()
}
fn default_output_name() -> String {
    defaults::MODEL_OUTPUT_NAME.to_string()
}
fn default_input_size() -> u32 {
    defaults::MODEL_INPUT_SIZE
}
fn default_min_pose_score() -> f32 {
    defaults::MIN_POSE_SCORE
}
fn default_intra_threads() -> usize {
    defaults::INTRA_THREADS
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_name: default_input_name(),
            output_name: default_output_name(),
            input_size: default_input_size(),
            min_pose_score: default_min_pose_score(),
            intra_threads: default_intra_threads(),
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Largest accepted `width * height` after decoding
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

fn default_max_pixels() -> u64 {
    defaults::MAX_DECODED_PIXELS
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_pixels: default_max_pixels(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Which detection store backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Embedded sled database on disk
    #[default]
    Sled,
    /// Process memory only; lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database directory for the sled backend
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(defaults::STORAGE_PATH)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on decode + estimate + persist per request; 0 disables
    #[serde(default)]
    pub request_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
