//! Checkpoint format detection
//!
//! Checkpoint files come in three shapes depending on how they were saved:
//! a plain name-to-tensor mapping, a dict wrapping that mapping under a
//! well-known field, or a serialized module object carrying its parameters
//! under framework bookkeeping segments. The shape is resolved once, up
//! front, and extraction flattens all three into the same plain mapping.

use std::collections::HashMap;

use candle_core::Tensor;

/// Wrapper fields recognized around a nested state dict
pub const WRAPPER_FIELDS: [&str; 2] = ["state_dict", "model_state"];

/// Path segments a serialized module object uses for parameter bookkeeping
const MODULE_SEGMENTS: [&str; 3] = ["_modules", "_parameters", "_buffers"];

/// Shape of a decoded checkpoint, resolved once at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// Flat name-to-tensor mapping, usable as-is
    Raw,
    /// Mapping nested under a recognized wrapper field
    Wrapped(&'static str),
    /// Full module export: parameters nested under bookkeeping segments
    ModuleExport,
}

/// Detect the format of a decoded checkpoint from its key structure.
///
/// A checkpoint is `Wrapped` only if *every* key sits under the same
/// recognized wrapper field; a partial wrap would make extraction lossy,
/// so mixed layouts fall through to the other arms.
pub fn detect_format<'a, I>(keys: I) -> CheckpointFormat
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    for field in WRAPPER_FIELDS {
        let prefix = format!("{field}.");
        let mut saw_any = false;
        let mut all = true;
        for key in keys.clone() {
            saw_any = true;
            if !key.starts_with(&prefix) {
                all = false;
                break;
            }
        }
        if saw_any && all {
            return CheckpointFormat::Wrapped(field);
        }
    }

    let is_module_export = keys.into_iter().any(|key| {
        key.split('.')
            .any(|segment| MODULE_SEGMENTS.contains(&segment))
    });
    if is_module_export {
        CheckpointFormat::ModuleExport
    } else {
        CheckpointFormat::Raw
    }
}

/// Flatten a decoded checkpoint into a plain parameter mapping.
///
/// - `Raw`: returned unchanged
/// - `Wrapped`: the wrapper field is stripped from every key
/// - `ModuleExport`: bookkeeping segments are dropped from each key path,
///   recovering the mapping the module's own state export would produce
///   (`_modules.conv1._parameters.weight` becomes `conv1.weight`)
pub fn extract_parameters(
    tensors: HashMap<String, Tensor>,
    format: CheckpointFormat,
) -> HashMap<String, Tensor> {
    match format {
        CheckpointFormat::Raw => tensors,
        CheckpointFormat::Wrapped(field) => {
            let prefix = format!("{field}.");
            tensors
                .into_iter()
                .map(|(key, tensor)| {
                    let stripped = key.strip_prefix(&prefix).unwrap_or(&key).to_string();
                    (stripped, tensor)
                })
                .collect()
        }
        CheckpointFormat::ModuleExport => tensors
            .into_iter()
            .map(|(key, tensor)| {
                let flattened: Vec<&str> = key
                    .split('.')
                    .filter(|segment| !MODULE_SEGMENTS.contains(segment))
                    .collect();
                (flattened.join("."), tensor)
            })
            .collect(),
    }
}
