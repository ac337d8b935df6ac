//! # Style Alchemist
//!
//! Local neural style transfer: load a pretrained style checkpoint, run a
//! feed-forward transformer network over a photo, and blend the result with
//! the original to control stylization intensity.
//!
//! ## Features
//!
//! - Best-effort checkpoint reconciliation: heterogeneous checkpoint files
//!   (plain state dicts, wrapped dicts, full module exports) are normalized
//!   and filtered against the network's parameter signature
//! - Per-style model cache so repeated requests skip redundant I/O
//! - Strictly local CPU inference via Candle (GPU optional)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use style_alchemist::{AppConfig, StyleAlchemist};
//!
//! let alchemist = StyleAlchemist::new(AppConfig::default())?;
//! let result = alchemist.stylize("photo.jpg", "vangogh", 0.8, Some(512))?;
//! result.save("stylized.png")?;
//! ```

// Require docs for public items, but not struct fields (too verbose)
#![warn(missing_docs)]
#![allow(rustdoc::missing_crate_level_docs)]

pub mod checkpoint;
pub mod config;
pub mod image;
pub mod models;
pub mod stylizer;

// Re-exports for convenience
pub use checkpoint::{CheckpointError, CheckpointLoader, Reconciliation};
pub use config::AppConfig;
pub use models::TransformerNet;
pub use stylizer::{StyleAlchemist, StylizeResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory searched for style checkpoints
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Default longest-side bound for input images (keeps CPU inference fast)
pub const DEFAULT_MAX_IMAGE_SIZE: u32 = 512;

/// Checkpoint container extensions recognized in the models directory
pub const CHECKPOINT_EXTENSIONS: [&str; 3] = ["safetensors", "pth", "pt"];
