//! Checkpoint loading and reconciliation
//!
//! - Format dispatch over heterogeneous checkpoint files (plain state
//!   dicts, wrapped dicts, full module exports)
//! - Key normalization and shape filtering against a parameter signature
//! - Style discovery over the models directory

mod format;
mod loader;
mod reconcile;

pub use format::{detect_format, extract_parameters, CheckpointFormat, WRAPPER_FIELDS};
pub use loader::{CheckpointError, CheckpointLoader, ParameterMapping};
pub use reconcile::{
    normalize_key, reconcile, DropReason, DroppedParameter, Reconciliation, Signature,
};
