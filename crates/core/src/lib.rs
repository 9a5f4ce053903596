//! Neutron Transport Core Library
//!
//! Monte Carlo transport of neutrons through a homogeneous medium. Each
//! neutron alternates exponentially distributed free flights with collisions
//! that either scatter it (direction resampled, speed kept) or absorb it.
//!
//! ## Pipeline
//!
//! - [`sampling`] - free-path, scattering-angle and isotropic-direction variates
//! - [`core_types`] - the [`Neutron`] state and its scatter/advance operations
//! - [`physics`] - acceleration fields and the adaptive motion integrator
//! - [`transport`] - the per-particle collision loop
//! - [`simulation`] - population runs, parallel fan-out and result reduction
//! - [`analysis`] - statistics and validation over run output
//!
//! ## Example
//!
//! ```
//! use neutron_sim_core::{run_simulation, SimulationConfig};
//! use neutron_sim_core::analysis::ExponentialValidation;
//!
//! let config = SimulationConfig::default().with_seed(7);
//! let result = run_simulation(config).unwrap();
//! let check = ExponentialValidation::evaluate(&result.path_lengths, 1.0, 10.0).unwrap();
//! assert!(check.passed);
//! ```

pub mod analysis;
pub mod core_types;
pub mod error;
pub mod physics;
pub mod sampling;
pub mod simulation;
pub mod transport;

// Re-export core types
pub use core_types::{Neutron, ScatterFrame, Vec3};
pub use error::{Result, TransportError};

// Re-export engine and driver types
pub use physics::{AccelerationField, FieldConfig, IntegratorSettings, MotionIntegrator};
pub use simulation::{
    particle_rng, run_simulation, ExecutionMode, NeutronSimulation, SimulationConfig,
    SimulationResult,
};
pub use transport::{CollisionFate, ParticleSummary, Termination, TransportEngine};
