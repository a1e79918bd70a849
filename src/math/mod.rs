//! Geometry used by chunk partitioning and culling

pub mod aabb;
pub mod frustum;

pub use aabb::Aabb;
pub use frustum::{Plane, Frustum};
