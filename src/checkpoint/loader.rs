//! Checkpoint file loading
//!
//! Style checkpoints live as `<style_name>.<ext>` files inside a single
//! models directory. The loader resolves a style name to an artifact,
//! decodes the container (safetensors, or torch pickle for `.pth`/`.pt`),
//! and flattens whatever shape it finds into a plain parameter mapping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{pickle, safetensors, Device, Tensor};
use thiserror::Error;

use crate::checkpoint::format::{detect_format, extract_parameters};
use crate::CHECKPOINT_EXTENSIONS;

/// Flat mapping from qualified parameter name to tensor
pub type ParameterMapping = HashMap<String, Tensor>;

/// Failures surfaced while loading a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// No artifact exists for the style in the models directory
    #[error("no checkpoint found for style \"{style}\" in {dir:?}")]
    NotFound {
        /// Style the caller asked for
        style: String,
        /// Directory that was searched
        dir: PathBuf,
    },
    /// The artifact decoded, but its shape is not a parameter mapping
    #[error("checkpoint for style \"{style}\" has an unrecognized format: {reason}")]
    UnrecognizedFormat {
        /// Style the artifact belongs to
        style: String,
        /// What made the content unusable
        reason: String,
    },
    /// A lower-level read or decode error, with the style attached
    #[error("failed to read checkpoint for style \"{style}\": {source}")]
    Read {
        /// Style the artifact belongs to
        style: String,
        /// Underlying decoder error
        #[source]
        source: candle_core::Error,
    },
}

/// Loads style checkpoints from a models directory
#[derive(Debug, Clone)]
pub struct CheckpointLoader {
    models_dir: PathBuf,
    device: Device,
}

impl CheckpointLoader {
    /// Create a loader over the given models directory
    pub fn new<P: AsRef<Path>>(models_dir: P, device: &Device) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            device: device.clone(),
        }
    }

    /// Directory this loader searches
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// List the styles available in the models directory.
    ///
    /// A style is any file with a recognized checkpoint extension; the
    /// name is the file stem. The list is sorted and deduplicated (a
    /// style present in two container formats appears once).
    pub fn discover_styles(&self) -> std::io::Result<Vec<String>> {
        let mut styles = Vec::new();
        for entry in std::fs::read_dir(&self.models_dir)? {
            let path = entry?.path();
            let has_known_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| CHECKPOINT_EXTENSIONS.contains(&e));
            if !has_known_ext {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                styles.push(stem.to_string());
            }
        }
        styles.sort();
        styles.dedup();
        Ok(styles)
    }

    /// Resolve a style name to an artifact path, if one exists.
    ///
    /// Extensions are probed in declaration order, so a safetensors file
    /// shadows a torch pickle of the same style.
    pub fn resolve(&self, style: &str) -> Option<PathBuf> {
        CHECKPOINT_EXTENSIONS
            .iter()
            .map(|ext| self.models_dir.join(format!("{style}.{ext}")))
            .find(|candidate| candidate.exists())
    }

    /// Load the checkpoint for a style as a flat parameter mapping.
    ///
    /// Existence is checked before any read so a missing file reports as
    /// `NotFound` with the style name rather than a generic I/O error.
    /// The decoded content is format-dispatched once (raw mapping,
    /// wrapped mapping, or full module export) and flattened.
    pub fn load(&self, style: &str) -> Result<ParameterMapping, CheckpointError> {
        let path = self.resolve(style).ok_or_else(|| CheckpointError::NotFound {
            style: style.to_string(),
            dir: self.models_dir.clone(),
        })?;

        let tensors = self.read_container(style, &path)?;
        if tensors.is_empty() {
            return Err(CheckpointError::UnrecognizedFormat {
                style: style.to_string(),
                reason: "artifact contains no tensors".to_string(),
            });
        }

        let format = detect_format(tensors.keys().map(String::as_str));
        Ok(extract_parameters(tensors, format))
    }

    fn read_container(
        &self,
        style: &str,
        path: &Path,
    ) -> Result<HashMap<String, Tensor>, CheckpointError> {
        let wrap = |source| CheckpointError::Read {
            style: style.to_string(),
            source,
        };

        match path.extension().and_then(|e| e.to_str()) {
            Some("safetensors") => safetensors::load(path, &self.device).map_err(wrap),
            Some("pth") | Some("pt") => {
                let pairs = pickle::read_all(path).map_err(wrap)?;
                Ok(pairs.into_iter().collect())
            }
            other => Err(CheckpointError::UnrecognizedFormat {
                style: style.to_string(),
                reason: format!("unsupported container extension {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use tempfile::tempdir;

    fn save_safetensors(dir: &Path, name: &str, keys: &[(&str, &[usize])]) {
        let tensors: HashMap<String, Tensor> = keys
            .iter()
            .map(|(key, shape)| {
                (
                    key.to_string(),
                    Tensor::zeros(*shape, DType::F32, &Device::Cpu).unwrap(),
                )
            })
            .collect();
        safetensors::save(&tensors, dir.join(name)).unwrap();
    }

    #[test]
    fn test_missing_style_reports_not_found() {
        let dir = tempdir().unwrap();
        let loader = CheckpointLoader::new(dir.path(), &Device::Cpu);

        let err = loader.load("vangogh").unwrap_err();
        match &err {
            CheckpointError::NotFound { style, .. } => assert_eq!(style, "vangogh"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(err.to_string().contains("vangogh"));
    }

    #[test]
    fn test_load_raw_safetensors() {
        let dir = tempdir().unwrap();
        save_safetensors(
            dir.path(),
            "mosaic.safetensors",
            &[("conv1.weight", &[4, 3, 3, 3]), ("conv1.bias", &[4])],
        );

        let loader = CheckpointLoader::new(dir.path(), &Device::Cpu);
        let mapping = loader.load("mosaic").unwrap();
        assert_eq!(mapping.len(), 2);
        assert!(mapping.contains_key("conv1.weight"));
    }

    #[test]
    fn test_load_wrapped_checkpoint_unwraps() {
        let dir = tempdir().unwrap();
        save_safetensors(
            dir.path(),
            "udnie.safetensors",
            &[
                ("model_state.conv1.weight", &[4, 3, 3, 3]),
                ("model_state.in1.bias", &[4]),
            ],
        );

        let loader = CheckpointLoader::new(dir.path(), &Device::Cpu);
        let mapping = loader.load("udnie").unwrap();
        assert!(mapping.contains_key("conv1.weight"));
        assert!(mapping.contains_key("in1.bias"));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_discover_styles_sorted_and_deduplicated() {
        let dir = tempdir().unwrap();
        save_safetensors(dir.path(), "udnie.safetensors", &[("w", &[1])]);
        save_safetensors(dir.path(), "candy.safetensors", &[("w", &[1])]);
        // Same style in a second container format, plus an unrelated file.
        std::fs::write(dir.path().join("candy.pth"), b"ignored").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"ignored").unwrap();

        let loader = CheckpointLoader::new(dir.path(), &Device::Cpu);
        let styles = loader.discover_styles().unwrap();
        assert_eq!(styles, vec!["candy", "udnie"]);
    }

    #[test]
    fn test_resolve_prefers_safetensors() {
        let dir = tempdir().unwrap();
        save_safetensors(dir.path(), "candy.safetensors", &[("w", &[1])]);
        std::fs::write(dir.path().join("candy.pth"), b"ignored").unwrap();

        let loader = CheckpointLoader::new(dir.path(), &Device::Cpu);
        let resolved = loader.resolve("candy").unwrap();
        assert_eq!(resolved.extension().unwrap(), "safetensors");
    }
}
