//! Main stylization pipeline
//!
//! Orchestrates the full operation for one request:
//! 1. Checkpoint loading for the chosen style
//! 2. Reconciliation against a fresh network's parameter signature
//! 3. Weight application and per-style caching
//! 4. Image preprocessing, forward pass, postprocessing
//! 5. Intensity blending with the original photo

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use candle_core::Device;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::checkpoint::{reconcile, CheckpointLoader, Reconciliation};
use crate::config::AppConfig;
use crate::image::{blend, ImageLoader, ImageOutput};
use crate::models::TransformerNet;
use crate::stylizer::cache::{InMemoryCache, ModelCache};

/// Result of one stylization request
pub struct StylizeResult {
    /// Final image after blending with the original
    pub image: RgbImage,
    /// Style that produced it
    pub style: String,
}

impl StylizeResult {
    /// Save the image to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ImageOutput::save(&self.image, path)
    }

    /// Output dimensions (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Style transfer pipeline with per-style model caching
pub struct StyleAlchemist {
    device: Device,
    config: AppConfig,
    loader: CheckpointLoader,
    cache: Box<dyn ModelCache>,
}

impl StyleAlchemist {
    /// Create a pipeline with the default in-memory model cache
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_cache(config, Box::new(InMemoryCache::new()))
    }

    /// Create a pipeline with an injected model cache
    pub fn with_cache(config: AppConfig, cache: Box<dyn ModelCache>) -> Result<Self> {
        let device = config.device()?;
        let loader = CheckpointLoader::new(&config.models_dir, &device);
        Ok(Self {
            device,
            config,
            loader,
            cache,
        })
    }

    /// Styles available in the models directory
    pub fn available_styles(&self) -> Result<Vec<String>> {
        self.loader.discover_styles().with_context(|| {
            format!(
                "Failed to scan models directory: {:?}",
                self.config.models_dir
            )
        })
    }

    /// Load and reconcile a style's checkpoint without applying it.
    ///
    /// Used for diagnostics: the report lists every dropped key and why.
    pub fn inspect(&self, style: &str) -> Result<Reconciliation> {
        let raw = self.loader.load(style)?;
        let net = TransformerNet::new(&self.device)?;
        Ok(reconcile(raw, &net.signature()))
    }

    /// Get an initialized model for a style, loading it on first use.
    ///
    /// The checkpoint is read, reconciled against a fresh network's
    /// signature, and applied; the result is cached under the style name
    /// so later requests skip the whole load. Zero matched parameters is
    /// surfaced as a warning, not an error: the model still runs, on its
    /// default initialization.
    pub fn load_model(&self, style: &str) -> Result<Arc<TransformerNet>> {
        if let Some(model) = self.cache.get(style) {
            debug!("style \"{}\": using cached model", style);
            return Ok(model);
        }

        let raw = self.loader.load(style)?;
        let mut net = TransformerNet::new(&self.device)?;
        let reconciliation = reconcile(raw, &net.signature());

        if reconciliation.is_degenerate() {
            warn!(
                "style \"{}\": zero parameters matched; output will reflect random initialization",
                style
            );
        } else {
            info!(
                "style \"{}\": matched {} parameters, dropped {}",
                style,
                reconciliation.match_count(),
                reconciliation.dropped.len()
            );
        }

        let applied = net.apply_parameters(&reconciliation.matched)?;
        debug!("style \"{}\": applied {} tensors", style, applied);

        let model = Arc::new(net);
        self.cache.insert(style, Arc::clone(&model));
        Ok(model)
    }

    /// Run the full stylization pipeline on one image.
    ///
    /// # Arguments
    /// * `input` - Path to the photo to stylize
    /// * `style` - Style name to load
    /// * `intensity` - Blend weight in [0, 1]; 0 returns the original
    /// * `max_size` - Optional longest-side bound applied before inference
    ///
    /// # Returns
    /// * StylizeResult holding the blended image
    pub fn stylize<P: AsRef<Path>>(
        &self,
        input: P,
        style: &str,
        intensity: f32,
        max_size: Option<u32>,
    ) -> Result<StylizeResult> {
        let model = self.load_model(style)?;

        let original = ImageLoader::load(input, max_size)?;
        let tensor = ImageLoader::preprocess(&original, &self.device)?;

        let output = model.forward(&tensor)?;
        let stylized = ImageOutput::to_image(&output)?;

        let image = blend(&original, &stylized, intensity);
        Ok(StylizeResult {
            image,
            style: style.to_string(),
        })
    }

    /// Device the pipeline runs on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Configuration in effect
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
