//! Neutron state: position, velocity and the alive flag
//!
//! A neutron is born at the origin with an isotropic direction, flies
//! between collisions under the configured acceleration field, and has its
//! direction resampled at every scatter. Scattering never changes the speed.
//! The `alive` flag only ever goes from `true` to `false`.

use crate::core_types::Vec3;
use crate::error::{Result, TransportError};
use crate::physics::{AccelerationField, KinematicState, MotionIntegrator};
use crate::sampling::{cosine_scattering_angle, sample_isotropic_direction, spherical_to_cartesian};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Reference frame for the sampled scattering angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScatterFrame {
    /// θ measured from the fixed +z axis
    #[default]
    Laboratory,
    /// θ measured from the incoming flight direction
    Incident,
}

/// A single transported neutron.
///
/// # Example
///
/// ```
/// use neutron_sim_core::{Neutron, Vec3};
/// use neutron_sim_core::physics::{MotionIntegrator, ZeroField};
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
/// let mut neutron = Neutron::isotropic(2.0, &mut rng).unwrap();
/// assert_eq!(neutron.position(), Vec3::zeros());
///
/// neutron.advance((0.0, 0.5), &ZeroField, &MotionIntegrator::default()).unwrap();
/// neutron.scatter(&mut rng).unwrap();
/// assert!((neutron.speed() - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neutron {
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) alive: bool,
    pub(crate) collisions: u32,
}

impl Neutron {
    /// Create a live neutron at `position` moving with `velocity`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if any component is NaN or infinite.
    pub fn new(position: Vec3, velocity: Vec3) -> Result<Self> {
        if !position.iter().all(|c| c.is_finite()) {
            return Err(TransportError::invalid("position must be finite"));
        }
        if !velocity.iter().all(|c| c.is_finite()) {
            return Err(TransportError::invalid("velocity must be finite"));
        }
        Ok(Self {
            position,
            velocity,
            alive: true,
            collisions: 0,
        })
    }

    /// Create a neutron at the origin with `speed` along a random isotropic
    /// direction.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `speed` is negative or not finite.
    pub fn isotropic<R: Rng + ?Sized>(speed: f64, rng: &mut R) -> Result<Self> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(TransportError::invalid(format!(
                "speed must be finite and >= 0, got {speed}"
            )));
        }
        let direction = sample_isotropic_direction(rng);
        Self::new(Vec3::zeros(), direction * speed)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Magnitude of the velocity.
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Number of completed collisions (scatter or absorption).
    pub fn collisions(&self) -> u32 {
        self.collisions
    }

    /// Terminal transition; there is no way back.
    pub(crate) fn absorb(&mut self) {
        self.alive = false;
    }

    pub(crate) fn record_collision(&mut self) {
        self.collisions = self.collisions.saturating_add(1);
    }

    /// Advance position and velocity over `time_span` under `field`.
    ///
    /// # Errors
    ///
    /// Propagates integrator errors (malformed span, non-finite state). The
    /// neutron is left untouched on error.
    pub fn advance(
        &mut self,
        time_span: (f64, f64),
        field: &dyn AccelerationField,
        integrator: &MotionIntegrator,
    ) -> Result<()> {
        let state = KinematicState::new(self.position, self.velocity);
        let end = integrator.advance(state, time_span, field)?;
        self.position = end.position;
        self.velocity = end.velocity;
        Ok(())
    }

    /// Scatter into a new direction sampled in the laboratory frame.
    ///
    /// # Errors
    ///
    /// `SamplingExhausted` from the angle sampler.
    pub fn scatter<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.scatter_in_frame(ScatterFrame::Laboratory, rng)
    }

    /// Scatter with θ drawn from the cos θ density and φ uniform on [0, 2π),
    /// interpreted in `frame`. The speed is carried over unchanged.
    ///
    /// A stationary neutron has no incident direction, so it always uses the
    /// laboratory frame.
    ///
    /// # Errors
    ///
    /// `SamplingExhausted` from the angle sampler.
    pub fn scatter_in_frame<R: Rng + ?Sized>(
        &mut self,
        frame: ScatterFrame,
        rng: &mut R,
    ) -> Result<()> {
        let theta = cosine_scattering_angle(rng)?;
        let phi = TAU * rng.random::<f64>();
        let speed = self.speed();

        let direction = match frame {
            ScatterFrame::Incident if speed > 0.0 => {
                rotate_from_incident(&(self.velocity / speed), theta, phi)
            }
            _ => spherical_to_cartesian(theta, phi),
        };
        self.velocity = direction * speed;
        Ok(())
    }
}

/// Direction deflected by polar angle `theta` and azimuth `phi` about the
/// unit vector `incident`.
fn rotate_from_incident(incident: &Vec3, theta: f64, phi: f64) -> Vec3 {
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (u, v, w) = (incident.x, incident.y, incident.z);

    // Near the poles the general formula divides by ~0
    let transverse = (1.0 - w * w).max(0.0).sqrt();
    let out = if transverse < 1e-10 {
        Vec3::new(
            sin_theta * cos_phi,
            sin_theta * sin_phi,
            w.signum() * cos_theta,
        )
    } else {
        Vec3::new(
            sin_theta * (u * w * cos_phi - v * sin_phi) / transverse + u * cos_theta,
            sin_theta * (v * w * cos_phi + u * sin_phi) / transverse + v * cos_theta,
            -sin_theta * cos_phi * transverse + w * cos_theta,
        )
    };
    out.normalize()
}
