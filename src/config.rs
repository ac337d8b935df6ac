//! Application configuration
//!
//! A small YAML file with serde defaults; every field can also be
//! overridden from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_MAX_IMAGE_SIZE, DEFAULT_MODELS_DIR};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding style checkpoints
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Longest-side bound applied to input images
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u32,

    /// Style intensity used when none is given (0.0 - 1.0)
    #[serde(default = "default_intensity")]
    pub default_intensity: f32,

    /// Whether to use the GPU when one is available
    #[serde(default)]
    pub use_gpu: bool,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MODELS_DIR)
}

fn default_max_image_size() -> u32 {
    DEFAULT_MAX_IMAGE_SIZE
}

fn default_intensity() -> f32 {
    1.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            max_image_size: default_max_image_size(),
            default_intensity: default_intensity(),
            use_gpu: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Select the compute device for this configuration
    pub fn device(&self) -> Result<Device> {
        if self.use_gpu {
            Device::cuda_if_available(0).map_err(Into::into)
        } else {
            Ok(Device::Cpu)
        }
    }
}
