//! State reconciliation against a fixed parameter signature
//!
//! Checkpoints in the wild rarely line up with the target network exactly:
//! multi-GPU training wraps every key under a `module.` namespace, and
//! older files carry normalization-statistics buffers the network does not
//! have. Reconciliation normalizes the keys, keeps every entry the network
//! can actually accept, and reports the rest instead of failing.

use std::collections::HashMap;

use candle_core::Tensor;

/// Leading path segment added by distributed-training wrappers
pub const DISTRIBUTED_PREFIX: &str = "module";

/// Expected parameter-name-to-shape mapping of the target network
pub type Signature = HashMap<String, Vec<usize>>;

/// Why a checkpoint entry was dropped during reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The normalized key does not exist in the reference signature
    UnknownKey,
    /// The key exists but the tensor shape differs from the expected shape
    ShapeMismatch {
        /// Shape the signature expects for this key
        expected: Vec<usize>,
        /// Shape found in the checkpoint
        actual: Vec<usize>,
    },
}

/// A checkpoint entry excluded from the reconciled mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedParameter {
    /// Normalized parameter name
    pub name: String,
    /// Why the entry was excluded
    pub reason: DropReason,
}

/// Outcome of reconciling a raw checkpoint mapping against a signature
///
/// `matched` is safe to apply to the target network: every key exists in
/// the signature with an identical shape. `dropped` records the rest so
/// the best-effort policy stays observable.
#[derive(Debug)]
pub struct Reconciliation {
    /// Entries safe to apply, keyed by normalized name
    pub matched: HashMap<String, Tensor>,
    /// Entries excluded, sorted by name, with the reason for each
    pub dropped: Vec<DroppedParameter>,
}

impl Reconciliation {
    /// Number of parameters that will be applied
    pub fn match_count(&self) -> usize {
        self.matched.len()
    }

    /// True when nothing matched: the model would run on its random
    /// initialization only. Advisory, not an error.
    pub fn is_degenerate(&self) -> bool {
        self.matched.is_empty()
    }

    /// Print a human-readable summary of matched and dropped entries
    pub fn print_summary(&self) {
        eprintln!("\n=== Checkpoint Reconciliation ===");
        eprintln!(
            "  Matched: {} | Dropped: {}",
            self.matched.len(),
            self.dropped.len()
        );

        if !self.dropped.is_empty() {
            eprintln!("  DROPPED:");
            for entry in self.dropped.iter().take(10) {
                match &entry.reason {
                    DropReason::UnknownKey => {
                        eprintln!("    - {} (not in target network)", entry.name)
                    }
                    DropReason::ShapeMismatch { expected, actual } => eprintln!(
                        "    - {} (shape {:?}, expected {:?})",
                        entry.name, actual, expected
                    ),
                }
            }
            if self.dropped.len() > 10 {
                eprintln!("    ... and {} more", self.dropped.len() - 10);
            }
        }
    }
}

/// Strip the distributed-training prefix from a parameter name.
///
/// The prefix is removed wherever it occurs as a leading path segment, so
/// doubly wrapped keys also normalize, and normalizing an already
/// normalized key returns it unchanged.
pub fn normalize_key(key: &str) -> String {
    let prefix = format!("{DISTRIBUTED_PREFIX}.");
    let mut name = key;
    while let Some(rest) = name.strip_prefix(&prefix) {
        name = rest;
    }
    name.to_string()
}

/// Reconcile a raw checkpoint mapping against a reference signature.
///
/// Two fixed steps, in order: normalize every key, then keep only entries
/// whose normalized key exists in the signature with an exactly equal
/// shape. Entries failing either test land in `dropped` with a reason.
/// An empty result is valid; the caller decides whether zero matches is
/// usable.
///
/// Raw keys are processed in sorted order so the result is identical for
/// any input iteration order; if two raw keys normalize to the same name,
/// the lexicographically greater raw key wins.
pub fn reconcile(raw: HashMap<String, Tensor>, signature: &Signature) -> Reconciliation {
    let mut entries: Vec<(String, Tensor)> = raw.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut matched: HashMap<String, Tensor> = HashMap::new();
    let mut dropped: Vec<DroppedParameter> = Vec::new();

    for (raw_key, tensor) in entries {
        let name = normalize_key(&raw_key);
        match signature.get(&name) {
            None => dropped.push(DroppedParameter {
                name,
                reason: DropReason::UnknownKey,
            }),
            Some(expected) => {
                let actual = tensor.dims().to_vec();
                if &actual == expected {
                    matched.insert(name, tensor);
                } else {
                    dropped.push(DroppedParameter {
                        name,
                        reason: DropReason::ShapeMismatch {
                            expected: expected.clone(),
                            actual,
                        },
                    });
                }
            }
        }
    }

    dropped.sort_by(|a, b| a.name.cmp(&b.name));
    Reconciliation { matched, dropped }
}
