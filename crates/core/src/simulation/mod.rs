//! Population-level transport runs
//!
//! `NeutronSimulation` validates a [`SimulationConfig`], builds the
//! acceleration field once, and transports `num_neutrons` independent
//! neutrons. Each particle draws from its own RNG substream derived from the
//! top-level seed and the particle index, so a seeded run gives identical
//! results whether it executes sequentially or across any number of threads.
//!
//! Trajectories share no mutable state while running; per-particle records
//! are collected in index order and merged once at the end.

pub mod config;
pub mod result;

pub use config::{ExecutionMode, SimulationConfig};
pub use result::SimulationResult;

use crate::core_types::Neutron;
use crate::error::{Result, TransportError};
use crate::physics::{AccelerationField, MotionIntegrator};
use crate::transport::{TrajectoryRecord, TransportEngine};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Probability sums closer to 1 than this are not reported as remainders.
const PROBABILITY_SLACK: f64 = 1e-12;

/// SplitMix64 finaliser, used to decorrelate neighbouring seeds.
#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Deterministic RNG substream for particle `index` under top-level `seed`.
pub fn particle_rng(seed: u64, index: u64) -> StdRng {
    StdRng::seed_from_u64(splitmix64(seed ^ splitmix64(index)))
}

/// Validated, ready-to-run transport simulation.
///
/// # Example
///
/// ```
/// use neutron_sim_core::{NeutronSimulation, SimulationConfig};
///
/// let config = SimulationConfig::default().with_num_neutrons(100).with_seed(42);
/// let result = NeutronSimulation::new(config).unwrap().run().unwrap();
/// assert_eq!(result.total_distances.len(), 100);
/// assert_eq!(result.path_lengths.len() as u64, result.total_collisions());
/// ```
#[derive(Debug)]
pub struct NeutronSimulation {
    config: SimulationConfig,
    field: Box<dyn AccelerationField>,
    seed: u64,
}

impl NeutronSimulation {
    /// Validate `config` and resolve the seed and acceleration field.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if any option is out of range. Nothing is run.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let remainder = config.probability_remainder();
        if remainder > PROBABILITY_SLACK {
            warn!(
                remainder,
                "scatter_prob + absorb_prob < 1; the remaining probability is treated as scattering"
            );
        } else if remainder < -PROBABILITY_SLACK {
            warn!(
                effective_absorb_prob = 1.0 - config.scatter_prob,
                "scatter_prob + absorb_prob > 1; absorption is truncated to the rest of the unit interval"
            );
        }

        let seed = if let Some(seed) = config.seed {
            seed
        } else {
            let seed: u64 = rand::rng().random();
            info!(seed, "no seed configured, drew one from entropy");
            seed
        };

        let field = config.field.build();
        Ok(Self {
            config,
            field,
            seed,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Seed in effect (configured or drawn at construction).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Transport every neutron and merge the results.
    ///
    /// # Errors
    ///
    /// Any fatal error from a single trajectory (`SamplingExhausted`,
    /// `NonFiniteState`) aborts the run, as does failing to build a dedicated
    /// thread pool. No partial results are returned. Stalled trajectories are
    /// not errors; they are counted in `stalled_particles`.
    pub fn run(&self) -> Result<SimulationResult> {
        let engine = TransportEngine::new(
            self.config.transport_params(),
            self.field.as_ref(),
            MotionIntegrator::new(self.config.integrator),
        )?;
        let spent = AtomicU64::new(0);

        info!(
            num_neutrons = self.config.num_neutrons,
            seed = self.seed,
            execution = ?self.config.execution,
            field = ?self.config.field,
            "starting transport run"
        );
        let started = Instant::now();

        let records: Vec<Option<TrajectoryRecord>> = match self.config.execution {
            ExecutionMode::Sequential => (0..self.config.num_neutrons)
                .map(|index| self.run_particle(&engine, index, &spent))
                .collect::<Result<_>>()?,
            ExecutionMode::Parallel => self.run_parallel(&engine, &spent)?,
            ExecutionMode::Threads(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| TransportError::ThreadPool(e.to_string()))?;
                debug!(threads, "running on dedicated pool");
                pool.install(|| self.run_parallel(&engine, &spent))?
            }
        };

        let result = SimulationResult::from_records(self.seed, records);
        if result.capped_particles > 0 {
            warn!(
                capped = result.capped_particles,
                max_collisions = self.config.max_collisions,
                "particles reached the collision cap and were forcibly absorbed"
            );
        }
        if result.stalled_particles > 0 {
            warn!(
                stalled = result.stalled_particles,
                max_steps = self.config.integrator.max_steps,
                "particles stopped on free flights longer than the integrator step limit"
            );
        }
        if result.skipped_particles > 0 {
            warn!(
                skipped = result.skipped_particles,
                budget = ?self.config.collision_budget,
                "collision budget exhausted before all particles ran"
            );
        }
        info!(
            particles = result.num_particles(),
            collisions = result.total_collisions(),
            elapsed = ?started.elapsed(),
            "transport run complete"
        );
        Ok(result)
    }

    fn run_parallel(
        &self,
        engine: &TransportEngine<'_>,
        spent: &AtomicU64,
    ) -> Result<Vec<Option<TrajectoryRecord>>> {
        (0..self.config.num_neutrons)
            .into_par_iter()
            .map(|index| self.run_particle(engine, index, spent))
            .collect()
    }

    /// Transport particle `index`, or return `None` if the run budget is spent.
    fn run_particle(
        &self,
        engine: &TransportEngine<'_>,
        index: usize,
        spent: &AtomicU64,
    ) -> Result<Option<TrajectoryRecord>> {
        if let Some(budget) = self.config.collision_budget {
            if spent.load(Ordering::Relaxed) >= budget {
                return Ok(None);
            }
        }
        let mut rng = particle_rng(self.seed, index as u64);
        let mut neutron = Neutron::isotropic(self.config.initial_speed, &mut rng)?;
        let record = engine.transport(&mut neutron, &mut rng)?;
        spent.fetch_add(u64::from(record.summary.collisions), Ordering::Relaxed);
        Ok(Some(record))
    }
}

/// Validate `config`, run it, and return the merged result.
///
/// # Errors
///
/// See [`NeutronSimulation::new`] and [`NeutronSimulation::run`].
pub fn run_simulation(config: SimulationConfig) -> Result<SimulationResult> {
    NeutronSimulation::new(config)?.run()
}
