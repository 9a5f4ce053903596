//! Error types for the transport engine
//!
//! Every fatal condition aborts the whole run; no partial results are returned.
//! Per-particle trouble is not an error: trajectories that hit the collision
//! cap or the integrator step limit end as
//! [`crate::transport::Termination::CapExceeded`] or
//! [`crate::transport::Termination::Stalled`].

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Fatal errors raised by sampling, integration or run setup.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A configuration or call parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The rejection sampler hit its per-sample trial ceiling.
    #[error("rejection sampling exhausted after {trials} trials")]
    SamplingExhausted {
        /// Number of candidates drawn before giving up
        trials: u32,
    },

    /// Motion integration produced a NaN or infinite component.
    #[error("non-finite particle state: {0}")]
    NonFiniteState(String),

    /// A single free flight needed more integrator steps than allowed.
    ///
    /// Happens when a field slows a neutron almost to rest, so that the
    /// flight time `distance / speed` becomes enormous. Returned by
    /// [`crate::physics::MotionIntegrator`]; the transport engine turns it
    /// into a stalled trajectory.
    #[error("integrator step limit of {steps} exceeded over a flight of {duration} time units")]
    StepLimitExceeded { steps: u64, duration: f64 },

    /// A dedicated rayon pool could not be created.
    #[error("thread pool unavailable: {0}")]
    ThreadPool(String),
}

impl TransportError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
