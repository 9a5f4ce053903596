//! Free-flight physics: acceleration fields and the motion integrator

pub mod field;
pub mod integrator;

pub use field::{AccelerationField, FieldConfig, LinearDrag, UniformField, ZeroField};
pub use integrator::{IntegratorSettings, KinematicState, MotionIntegrator};
