//! Shadow module
//!
//! Cascaded shadow maps of directional lights and the per-frame cache that
//! owns them.

pub mod shadow;
pub mod shadow_cache;

pub use shadow::{cascade_distances, Cascade, Shadow};
pub use shadow_cache::ShadowCache;
