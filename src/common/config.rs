use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{VoteError, Result};
use crate::common::paths;

/// Tolerance used by the reference face_recognition models: encodings closer
/// than this are the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub models: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_bind() -> String { "127.0.0.1:5000".to_string() }
fn default_static_dir() -> PathBuf { PathBuf::from("build") }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Root that every `reference_photo_path` in the database is relative to.
    pub photo_root: PathBuf,
    pub capture_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    pub detector_path: PathBuf,
    pub recognizer_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_size")]
    pub input_width: u32,
    #[serde(default = "default_detector_size")]
    pub input_height: u32,
    #[serde(default = "default_detection_confidence")]
    pub detection_confidence: f32,
}

fn default_detector_size() -> u32 { 640 }
fn default_detection_confidence() -> f32 { 0.5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: default_detector_size(),
            input_height: default_detector_size(),
            detection_confidence: default_detection_confidence(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    #[serde(default = "default_recognizer_size")]
    pub input_size: u32,
    #[serde(default = "default_normalization")]
    pub normalization_value: f32,
}

fn default_recognizer_size() -> u32 { 112 }
fn default_normalization() -> f32 { 127.5 }

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            input_size: default_recognizer_size(),
            normalization_value: default_normalization(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

fn default_tolerance() -> f32 { DEFAULT_TOLERANCE }
fn default_max_upload() -> usize { 10 * 1024 * 1024 }

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_optimization_level() -> u32 { 3 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { optimization_level: default_optimization_level() }
    }
}

impl Config {
    /// Resolve the config file: an explicit path wins, then the working
    /// directory copy, then the system-wide file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let local = PathBuf::from("configs/facevote.toml");
        if local.exists() {
            return Self::load_from_path(&local);
        }

        let mut config = Self::load_from_path(&paths::system_config_file())?;
        config.resolve_relative(&paths::system_data_dir(), &paths::system_models_dir());
        Ok(config)
    }

    /// Anchor relative storage paths at `data_base` and model paths at `models_base`.
    pub fn resolve_relative(&mut self, data_base: &Path, models_base: &Path) {
        let anchor = |path: &mut PathBuf, base: &Path| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        anchor(&mut self.storage.database_path, data_base);
        anchor(&mut self.storage.photo_root, data_base);
        anchor(&mut self.storage.capture_dir, data_base);
        anchor(&mut self.models.detector_path, models_base);
        anchor(&mut self.models.recognizer_path, models_base);
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VoteError::Config(format!(
                "Config file not found: {}. Please create it from the example.", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| VoteError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.verification.tolerance > 0.0 && self.verification.tolerance <= 2.0) {
            return Err(VoteError::Config(format!(
                "Tolerance must be in (0.0, 2.0], got {}", self.verification.tolerance
            )));
        }
        if self.verification.max_upload_bytes == 0 {
            return Err(VoteError::Config("Max upload size must be positive".into()));
        }

        if self.detector.detection_confidence < 0.0 || self.detector.detection_confidence > 1.0 {
            return Err(VoteError::Config(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.detection_confidence
            )));
        }
        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(VoteError::Config(format!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(VoteError::Config(format!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }

        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(VoteError::Config(format!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }
        if self.recognizer.normalization_value <= 0.0 {
            return Err(VoteError::Config(format!(
                "Normalization value must be positive, got {}",
                self.recognizer.normalization_value
            )));
        }

        Ok(())
    }
}
