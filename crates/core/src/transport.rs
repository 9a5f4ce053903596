//! Per-particle transport loop
//!
//! Drives one neutron from birth to termination:
//!
//! 1. Sample a free path `s ~ Exp(λ)`
//! 2. Convert to a flight time `s / |v|` (fallback step for stationary neutrons)
//! 3. Integrate the flight and record the displacement actually covered
//! 4. Resolve the collision fate from a single uniform variate
//! 5. Count the collision and enforce the per-particle collision cap
//!
//! A flight the integrator cannot finish within its step limit (a field has
//! slowed the neutron almost to rest) ends that trajectory as
//! [`Termination::Stalled`]. The rest of the run carries on.
//!
//! With a force-free field the recorded displacement equals the sampled free
//! path. Under a bending field they differ; both are kept so callers can
//! compare the nominal and realised distributions.

use crate::core_types::Neutron;
use crate::core_types::ScatterFrame;
use crate::error::{Result, TransportError};
use crate::physics::{AccelerationField, MotionIntegrator};
use crate::sampling::exponential_free_path;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Flight time used when the neutron's speed is below [`SPEED_EPSILON`].
///
/// A stationary neutron cannot convert a distance into a time; it sits still
/// for this long, records a zero-length segment, then collides as usual.
pub const ZERO_SPEED_TIME_STEP: f64 = 1e-3;

/// Speeds at or below this are treated as zero.
pub const SPEED_EPSILON: f64 = 1e-12;

/// Outcome of a single collision.
///
/// The unit interval is partitioned as
///
/// ```text
/// [0, s)        -> Scatter
/// [s, s + a)    -> Absorb
/// [s + a, 1)    -> RemainderScatter
/// ```
///
/// where `s` is the scatter probability and `a` the absorption probability.
/// Probability mass not claimed by either (when `s + a < 1`) folds into
/// scattering. When `s + a > 1` the absorb band is cut off at 1, so the
/// effective absorption probability is `1 - s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionFate {
    Scatter,
    Absorb,
    /// Scatter from the unassigned remainder of the unit interval
    RemainderScatter,
}

impl CollisionFate {
    /// Map a fate variate `u` in [0, 1) onto a collision outcome.
    pub fn resolve(u: f64, scatter_prob: f64, absorb_prob: f64) -> Self {
        if u < scatter_prob {
            Self::Scatter
        } else if u < scatter_prob + absorb_prob {
            Self::Absorb
        } else {
            Self::RemainderScatter
        }
    }

    pub fn is_scatter(self) -> bool {
        matches!(self, Self::Scatter | Self::RemainderScatter)
    }
}

/// How a trajectory ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// Absorbed by a collision
    Absorbed,
    /// Still alive at `max_collisions`; forcibly absorbed
    CapExceeded,
    /// Free flight too long for the integrator step limit; the unfinished
    /// segment is not recorded
    Stalled,
}

/// Per-particle outcome once its trajectory has ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleSummary {
    /// Distance from the birth position to the final position
    pub net_displacement: f64,
    /// Completed collisions, including the terminating one
    pub collisions: u32,
    pub termination: Termination,
}

/// Everything recorded along one trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRecord {
    /// Realised displacement of each free-flight segment
    pub path_lengths: Vec<f64>,
    /// Sampled free path for each segment, parallel to `path_lengths`
    pub sampled_distances: Vec<f64>,
    pub summary: ParticleSummary,
}

/// Medium and collision parameters shared by every trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportParams {
    pub scatter_prob: f64,
    pub absorb_prob: f64,
    pub mean_free_path: f64,
    pub max_collisions: u32,
    pub scatter_frame: ScatterFrame,
}

impl TransportParams {
    /// # Errors
    ///
    /// `InvalidParameter` for a non-positive mean free path, probabilities
    /// outside [0, 1] or a zero collision cap.
    pub fn validate(&self) -> Result<()> {
        if !self.mean_free_path.is_finite() || self.mean_free_path <= 0.0 {
            return Err(TransportError::invalid(format!(
                "mean_free_path must be finite and > 0, got {}",
                self.mean_free_path
            )));
        }
        for (name, p) in [
            ("scatter_prob", self.scatter_prob),
            ("absorb_prob", self.absorb_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(TransportError::invalid(format!(
                    "{name} must be in [0, 1], got {p}"
                )));
            }
        }
        if self.max_collisions == 0 {
            return Err(TransportError::invalid("max_collisions must be >= 1"));
        }
        Ok(())
    }
}

/// Flight time to cover `distance` at `speed`.
#[inline]
pub fn time_to_collision(distance: f64, speed: f64) -> f64 {
    if speed <= SPEED_EPSILON {
        ZERO_SPEED_TIME_STEP
    } else {
        distance / speed
    }
}

/// Runs single-particle trajectories against a fixed medium and field.
#[derive(Debug, Clone, Copy)]
pub struct TransportEngine<'a> {
    params: TransportParams,
    field: &'a dyn AccelerationField,
    integrator: MotionIntegrator,
}

impl<'a> TransportEngine<'a> {
    /// # Errors
    ///
    /// `InvalidParameter` if `params` fail validation.
    pub fn new(
        params: TransportParams,
        field: &'a dyn AccelerationField,
        integrator: MotionIntegrator,
    ) -> Result<Self> {
        params.validate()?;
        integrator.settings().validate()?;
        Ok(Self {
            params,
            field,
            integrator,
        })
    }

    pub fn params(&self) -> &TransportParams {
        &self.params
    }

    /// Whether a flight of `duration` can finish within the integrator's
    /// step limit. Every step covers at most `max_step`.
    fn flight_fits(&self, duration: f64) -> bool {
        if self.field.is_force_free() {
            return true;
        }
        let settings = self.integrator.settings();
        duration / settings.max_step <= settings.max_steps as f64
    }

    /// Transport `neutron` until it is absorbed, hits the collision cap or
    /// stalls on an overlong flight.
    ///
    /// A neutron that is already dead produces an empty record.
    ///
    /// # Errors
    ///
    /// `SamplingExhausted` or `NonFiniteState`; both are fatal to the run.
    /// Hitting the integrator step limit is not an error and ends the
    /// trajectory as [`Termination::Stalled`].
    pub fn transport<R: Rng + ?Sized>(
        &self,
        neutron: &mut Neutron,
        rng: &mut R,
    ) -> Result<TrajectoryRecord> {
        let TransportParams {
            scatter_prob,
            absorb_prob,
            mean_free_path,
            max_collisions,
            scatter_frame,
        } = self.params;

        let birth = neutron.position();
        let mut path_lengths = Vec::new();
        let mut sampled_distances = Vec::new();
        let mut termination = Termination::Absorbed;

        while neutron.is_alive() {
            // Flying
            let distance = exponential_free_path(mean_free_path, rng);
            let dt = time_to_collision(distance, neutron.speed());
            let before = neutron.position();
            let flown = if self.flight_fits(dt) {
                match neutron.advance((0.0, dt), self.field, &self.integrator) {
                    Ok(()) => true,
                    Err(TransportError::StepLimitExceeded { .. }) => false,
                    Err(e) => return Err(e),
                }
            } else {
                false
            };
            if !flown {
                debug!(
                    collisions = neutron.collisions(),
                    flight_time = dt,
                    "free flight exceeds the integrator step limit, stopping trajectory"
                );
                neutron.absorb();
                termination = Termination::Stalled;
                break;
            }
            path_lengths.push((neutron.position() - before).norm());
            sampled_distances.push(distance);

            // Colliding
            let fate = CollisionFate::resolve(rng.random(), scatter_prob, absorb_prob);
            if fate.is_scatter() {
                neutron.scatter_in_frame(scatter_frame, rng)?;
            } else {
                neutron.absorb();
            }
            neutron.record_collision();
            trace!(collision = neutron.collisions(), ?fate, distance, "collision");

            if neutron.is_alive() && neutron.collisions() >= max_collisions {
                debug!(max_collisions, "trajectory hit collision cap, forcing absorption");
                neutron.absorb();
                termination = Termination::CapExceeded;
            }
        }

        Ok(TrajectoryRecord {
            path_lengths,
            sampled_distances,
            summary: ParticleSummary {
                net_displacement: (neutron.position() - birth).norm(),
                collisions: neutron.collisions(),
                termination,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;
    use crate::physics::{FieldConfig, IntegratorSettings, LinearDrag, UniformField, ZeroField};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(scatter_prob: f64, absorb_prob: f64, max_collisions: u32) -> TransportParams {
        TransportParams {
            scatter_prob,
            absorb_prob,
            mean_free_path: 1.0,
            max_collisions,
            scatter_frame: ScatterFrame::Laboratory,
        }
    }

    #[test]
    fn test_fate_partition_boundaries() {
        // u == s lands in the absorb band
        assert_eq!(CollisionFate::resolve(0.7, 0.7, 0.3), CollisionFate::Absorb);
        assert_eq!(
            CollisionFate::resolve(0.699_999, 0.7, 0.3),
            CollisionFate::Scatter
        );
        // u == s + a lands in the remainder
        assert_eq!(
            CollisionFate::resolve(0.75, 0.25, 0.5),
            CollisionFate::RemainderScatter
        );
        assert_eq!(CollisionFate::resolve(0.5, 0.25, 0.5), CollisionFate::Absorb);
        assert!(CollisionFate::RemainderScatter.is_scatter());
        assert!(!CollisionFate::Absorb.is_scatter());
    }

    #[test]
    fn test_fate_with_oversubscribed_probabilities() {
        // s + a > 1: absorb band is truncated at 1
        assert_eq!(CollisionFate::resolve(0.95, 0.8, 0.8), CollisionFate::Absorb);
        assert_eq!(CollisionFate::resolve(0.5, 0.8, 0.8), CollisionFate::Scatter);
    }

    #[test]
    fn test_zero_speed_uses_fallback_step() {
        assert_eq!(time_to_collision(3.0, 0.0), ZERO_SPEED_TIME_STEP);
        assert_eq!(time_to_collision(3.0, 1e-15), ZERO_SPEED_TIME_STEP);
        assert_eq!(time_to_collision(3.0, 2.0), 1.5);
    }

    #[test]
    fn test_no_absorption_hits_cap_exactly() {
        let engine =
            TransportEngine::new(params(0.5, 0.0, 37), &ZeroField, MotionIntegrator::default())
                .unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            let mut n = Neutron::isotropic(1.0, &mut rng).unwrap();
            let record = engine.transport(&mut n, &mut rng).unwrap();
            assert_eq!(record.summary.collisions, 37);
            assert_eq!(record.summary.termination, Termination::CapExceeded);
            assert_eq!(record.path_lengths.len(), 37);
            assert!(!n.is_alive());
        }
    }

    #[test]
    fn test_certain_absorption_ends_after_one_collision() {
        let engine =
            TransportEngine::new(params(0.0, 1.0, 100), &ZeroField, MotionIntegrator::default())
                .unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let mut n = Neutron::isotropic(1.0, &mut rng).unwrap();
        let record = engine.transport(&mut n, &mut rng).unwrap();
        assert_eq!(record.summary.collisions, 1);
        assert_eq!(record.summary.termination, Termination::Absorbed);
        // Single straight segment: displacement equals the path
        assert!((record.summary.net_displacement - record.path_lengths[0]).abs() < 1e-12);
    }

    #[test]
    fn test_straight_flight_records_sampled_distance() {
        let engine =
            TransportEngine::new(params(0.7, 0.3, 1000), &ZeroField, MotionIntegrator::default())
                .unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..50 {
            let mut n = Neutron::isotropic(2.5, &mut rng).unwrap();
            let record = engine.transport(&mut n, &mut rng).unwrap();
            for (actual, sampled) in record.path_lengths.iter().zip(&record.sampled_distances) {
                assert!((actual - sampled).abs() < 1e-9 * sampled.max(1.0));
            }
        }
    }

    #[test]
    fn test_bending_field_lengthens_chord() {
        let field = UniformField::new(Vec3::new(0.0, 0.0, -5.0));
        let engine =
            TransportEngine::new(params(0.0, 1.0, 10), &field, MotionIntegrator::default())
                .unwrap();
        let mut rng = StdRng::seed_from_u64(12);
        let mut n = Neutron::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let record = engine.transport(&mut n, &mut rng).unwrap();
        // A parabolic arc covers a longer chord than the straight flight time implies
        assert!(record.path_lengths[0] > record.sampled_distances[0]);
    }

    #[test]
    fn test_overlong_flight_stalls_particle() {
        let integrator = MotionIntegrator::new(IntegratorSettings {
            max_steps: 10,
            ..IntegratorSettings::default()
        });
        let field = LinearDrag { coefficient: 0.1 };
        let engine = TransportEngine::new(params(1.0, 0.0, 50), &field, integrator).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let mut n = Neutron::isotropic(1.0, &mut rng).unwrap();
        let record = engine.transport(&mut n, &mut rng).unwrap();

        // 10 steps of 0.01 cannot cover a unit mean free path for long
        assert_eq!(record.summary.termination, Termination::Stalled);
        assert!(!n.is_alive());
        assert!(record.summary.collisions < 50);
        assert_eq!(record.path_lengths.len(), record.summary.collisions as usize);
        assert_eq!(record.sampled_distances.len(), record.path_lengths.len());
    }

    #[test]
    fn test_force_free_flight_never_stalls() {
        let integrator = MotionIntegrator::new(IntegratorSettings {
            max_steps: 1,
            ..IntegratorSettings::default()
        });
        let engine = TransportEngine::new(params(1.0, 0.0, 20), &ZeroField, integrator).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let mut n = Neutron::isotropic(1.0, &mut rng).unwrap();
        let record = engine.transport(&mut n, &mut rng).unwrap();
        assert_eq!(record.summary.termination, Termination::CapExceeded);
        assert_eq!(record.summary.collisions, 20);
    }

    #[test]
    fn test_stationary_neutron_terminates() {
        let field = FieldConfig::Zero.build();
        let engine =
            TransportEngine::new(params(1.0, 0.0, 5), field.as_ref(), MotionIntegrator::default())
                .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut n = Neutron::new(Vec3::zeros(), Vec3::zeros()).unwrap();
        let record = engine.transport(&mut n, &mut rng).unwrap();
        assert_eq!(record.summary.collisions, 5);
        assert!(record.path_lengths.iter().all(|&d| d == 0.0));
        assert_eq!(record.summary.net_displacement, 0.0);
    }

    #[test]
    fn test_dead_neutron_produces_empty_record() {
        let engine =
            TransportEngine::new(params(0.7, 0.3, 10), &ZeroField, MotionIntegrator::default())
                .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut n = Neutron::isotropic(1.0, &mut rng).unwrap();
        n.absorb();
        let record = engine.transport(&mut n, &mut rng).unwrap();
        assert!(record.path_lengths.is_empty());
        assert_eq!(record.summary.collisions, 0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut p = params(0.7, 0.3, 10);
        p.mean_free_path = 0.0;
        assert!(TransportEngine::new(p, &ZeroField, MotionIntegrator::default()).is_err());
        let p = params(1.2, 0.3, 10);
        assert!(TransportEngine::new(p, &ZeroField, MotionIntegrator::default()).is_err());
        let p = params(0.7, 0.3, 0);
        assert!(TransportEngine::new(p, &ZeroField, MotionIntegrator::default()).is_err());
    }
}
