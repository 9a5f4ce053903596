//! Run configuration
//!
//! `SimulationConfig::default()` reproduces the reference scenario: 1000
//! neutrons, scatter probability 0.7, absorption probability 0.3, unit mean
//! free path and unit initial speed in a force-free medium.

use crate::core_types::ScatterFrame;
use crate::error::{Result, TransportError};
use crate::physics::{FieldConfig, IntegratorSettings};
use crate::transport::TransportParams;
use serde::{Deserialize, Serialize};

/// How particle trajectories are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One particle after another on the calling thread
    Sequential,
    /// Fan out over rayon's global pool
    #[default]
    Parallel,
    /// Fan out over a dedicated pool with this many threads
    Threads(usize),
}

/// Complete description of a transport run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Population size (>= 1)
    pub num_neutrons: usize,
    /// Probability that a collision scatters, in [0, 1]
    pub scatter_prob: f64,
    /// Probability that a collision absorbs, in [0, 1]
    ///
    /// Mass left over when `scatter_prob + absorb_prob < 1` also scatters.
    pub absorb_prob: f64,
    /// Scale of the exponential free-path distribution (> 0)
    pub mean_free_path: f64,
    /// Speed assigned to every neutron at birth (> 0)
    pub initial_speed: f64,
    /// Per-trajectory collision cap (>= 1)
    pub max_collisions: u32,
    /// Top-level seed; drawn from entropy when absent
    pub seed: Option<u64>,
    pub field: FieldConfig,
    pub scatter_frame: ScatterFrame,
    pub execution: ExecutionMode,
    /// Stop starting new particles once this many collisions have occurred
    pub collision_budget: Option<u64>,
    pub integrator: IntegratorSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_neutrons: 1000,
            scatter_prob: 0.7,
            absorb_prob: 0.3,
            mean_free_path: 1.0,
            initial_speed: 1.0,
            max_collisions: 10_000,
            seed: None,
            field: FieldConfig::Zero,
            scatter_frame: ScatterFrame::Laboratory,
            execution: ExecutionMode::Parallel,
            collision_budget: None,
            integrator: IntegratorSettings::default(),
        }
    }
}

impl SimulationConfig {
    pub fn with_num_neutrons(mut self, num_neutrons: usize) -> Self {
        self.num_neutrons = num_neutrons;
        self
    }

    pub fn with_probabilities(mut self, scatter_prob: f64, absorb_prob: f64) -> Self {
        self.scatter_prob = scatter_prob;
        self.absorb_prob = absorb_prob;
        self
    }

    pub fn with_mean_free_path(mut self, mean_free_path: f64) -> Self {
        self.mean_free_path = mean_free_path;
        self
    }

    pub fn with_initial_speed(mut self, initial_speed: f64) -> Self {
        self.initial_speed = initial_speed;
        self
    }

    pub fn with_max_collisions(mut self, max_collisions: u32) -> Self {
        self.max_collisions = max_collisions;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_field(mut self, field: FieldConfig) -> Self {
        self.field = field;
        self
    }

    pub fn with_scatter_frame(mut self, scatter_frame: ScatterFrame) -> Self {
        self.scatter_frame = scatter_frame;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_collision_budget(mut self, budget: u64) -> Self {
        self.collision_budget = Some(budget);
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorSettings) -> Self {
        self.integrator = integrator;
        self
    }

    /// Per-trajectory parameters handed to the transport engine.
    pub fn transport_params(&self) -> TransportParams {
        TransportParams {
            scatter_prob: self.scatter_prob,
            absorb_prob: self.absorb_prob,
            mean_free_path: self.mean_free_path,
            max_collisions: self.max_collisions,
            scatter_frame: self.scatter_frame,
        }
    }

    /// Probability mass outside `[0, scatter_prob + absorb_prob)`.
    ///
    /// Positive: unassigned mass that folds into scattering. Negative: the
    /// absorb band overruns 1 and is truncated.
    pub fn probability_remainder(&self) -> f64 {
        1.0 - (self.scatter_prob + self.absorb_prob)
    }

    /// Check every option before any simulation work begins.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        if self.num_neutrons == 0 {
            return Err(TransportError::invalid("num_neutrons must be >= 1"));
        }
        self.transport_params().validate()?;
        if !self.initial_speed.is_finite() || self.initial_speed <= 0.0 {
            return Err(TransportError::invalid(format!(
                "initial_speed must be finite and > 0, got {}",
                self.initial_speed
            )));
        }
        if self.execution == ExecutionMode::Threads(0) {
            return Err(TransportError::invalid("thread count must be >= 1"));
        }
        if self.collision_budget == Some(0) {
            return Err(TransportError::invalid("collision_budget must be >= 1"));
        }
        self.field.validate()?;
        self.integrator.validate()
    }
}
