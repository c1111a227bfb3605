/// Math helpers: bounding volumes, rays, frustum culling

pub mod bounds;
pub mod ray;
pub mod frustum;

pub use bounds::{BoundingBox, BoundingSphere};
pub use ray::{Ray, TriangleHit, PICK_TOLERANCE};
pub use frustum::Frustum;
