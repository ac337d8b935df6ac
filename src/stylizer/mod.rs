//! Stylization pipeline
//!
//! - StyleAlchemist: load, reconcile, cache, and run style models
//! - Model cache abstraction with in-memory and no-op implementations

mod cache;
mod pipeline;

pub use cache::{InMemoryCache, ModelCache, NoopCache};
pub use pipeline::{StyleAlchemist, StylizeResult};
