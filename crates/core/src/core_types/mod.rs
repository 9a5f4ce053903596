//! Core types and utilities

pub mod particle;
pub mod vec3;

pub use particle::{Neutron, ScatterFrame};
pub use vec3::Vec3;
