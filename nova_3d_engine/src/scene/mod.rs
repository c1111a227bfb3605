//! Scene module
//!
//! Provides the node hierarchy, cameras, lights and the drawables nodes
//! render (models, batches, instanced sets, groups and LOD models).

mod scene;
mod camera;
mod light;
mod drawable;
mod instanced;

pub use scene::{Node, NodeKey, PickHit, Scene};
pub use camera::{Camera, Projection};
pub use light::{Light, LightKind, DEFAULT_CASCADE_COUNT, DEFAULT_SHADOW_MAP_SIZE};
pub use drawable::{Drawable, DrawableKind, DrawableProps, LodModel, Model};
pub use instanced::Instanced;
