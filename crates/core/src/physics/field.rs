//! Acceleration fields acting on particles between collisions
//!
//! A homogeneous medium without external forces uses [`ZeroField`], which
//! reduces free flight to straight-line kinematics. The other fields exist
//! to exercise the forced-motion path of the integrator:
//!
//! - [`UniformField`] - constant acceleration (e.g. gravity), `a = g`
//! - [`LinearDrag`] - velocity-proportional damping, `a = -k v`

use crate::core_types::Vec3;
use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of the acceleration `dv/dt = a(t, x, v)` used during free flight.
///
/// Implementations must be cheap to evaluate and thread-safe: the same field
/// is shared by every particle of a parallel run.
pub trait AccelerationField: Send + Sync + fmt::Debug {
    /// Acceleration at time `t` (relative to the start of the flight
    /// segment) for a particle at `position` moving with `velocity`.
    fn acceleration(&self, t: f64, position: &Vec3, velocity: &Vec3) -> Vec3;

    /// True when the field is identically zero, letting the integrator take
    /// the exact straight-line path.
    fn is_force_free(&self) -> bool {
        false
    }
}

/// No forces: particles fly in straight lines.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZeroField;

impl AccelerationField for ZeroField {
    fn acceleration(&self, _t: f64, _position: &Vec3, _velocity: &Vec3) -> Vec3 {
        Vec3::zeros()
    }

    fn is_force_free(&self) -> bool {
        true
    }
}

/// Constant acceleration everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField {
    pub acceleration: Vec3,
}

impl UniformField {
    pub fn new(acceleration: Vec3) -> Self {
        Self { acceleration }
    }
}

impl AccelerationField for UniformField {
    fn acceleration(&self, _t: f64, _position: &Vec3, _velocity: &Vec3) -> Vec3 {
        self.acceleration
    }

    fn is_force_free(&self) -> bool {
        self.acceleration == Vec3::zeros()
    }
}

/// Linear drag `a = -k v`; speed decays as `e^{-kt}` during flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearDrag {
    pub coefficient: f64,
}

impl AccelerationField for LinearDrag {
    fn acceleration(&self, _t: f64, _position: &Vec3, velocity: &Vec3) -> Vec3 {
        velocity * -self.coefficient
    }

    fn is_force_free(&self) -> bool {
        self.coefficient == 0.0
    }
}

/// Serializable field selection, resolved once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldConfig {
    /// Force-free straight-line flight
    #[default]
    Zero,
    /// Constant acceleration vector
    Uniform { acceleration: [f64; 3] },
    /// Velocity-proportional damping with coefficient k >= 0
    LinearDrag { coefficient: f64 },
}

impl FieldConfig {
    /// Check that every field parameter is finite (and drag non-negative).
    ///
    /// # Errors
    ///
    /// `InvalidParameter` describing the offending value.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Zero => Ok(()),
            Self::Uniform { acceleration } => {
                if acceleration.iter().all(|c| c.is_finite()) {
                    Ok(())
                } else {
                    Err(TransportError::invalid(
                        "uniform field acceleration must be finite",
                    ))
                }
            }
            Self::LinearDrag { coefficient } => {
                if coefficient.is_finite() && coefficient >= 0.0 {
                    Ok(())
                } else {
                    Err(TransportError::invalid(format!(
                        "drag coefficient must be finite and >= 0, got {coefficient}"
                    )))
                }
            }
        }
    }

    /// Instantiate the configured field.
    pub fn build(&self) -> Box<dyn AccelerationField> {
        match *self {
            Self::Zero => Box::new(ZeroField),
            Self::Uniform { acceleration } => {
                Box::new(UniformField::new(Vec3::from(acceleration)))
            }
            Self::LinearDrag { coefficient } => Box::new(LinearDrag { coefficient }),
        }
    }
}
