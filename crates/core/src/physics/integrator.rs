//! Adaptive free-flight integration
//!
//! Integrates the coupled kinematic system
//!
//! ```text
//! dx/dt = v
//! dv/dt = a(t, x, v)
//! ```
//!
//! with an embedded Dormand-Prince 5(4) Runge-Kutta pair. The local error
//! estimate drives the step size; steps are capped at `max_step` for
//! stability and floored at `min_step`, where a step is accepted regardless
//! of its error estimate so that integration always terminates.
//!
//! Force-free fields skip the Runge-Kutta machinery entirely and apply the
//! exact straight-line update `x += v Δt`.

use crate::core_types::Vec3;
use crate::error::{Result, TransportError};
use crate::physics::field::AccelerationField;
use serde::{Deserialize, Serialize};

// Dormand-Prince 5(4) tableau
const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
const A: [&[f64]; 6] = [
    &[],
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
    &[
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];
const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
/// Difference between the 5th and embedded 4th order weights (7 stages, FSAL).
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Tolerances and step bounds for the adaptive integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegratorSettings {
    /// Relative tolerance on each state component
    pub rtol: f64,
    /// Absolute tolerance on each state component
    pub atol: f64,
    /// Largest allowed step (time units)
    pub max_step: f64,
    /// Step floor; steps this small are always accepted
    pub min_step: f64,
    /// Attempted steps allowed for a single flight before giving up
    pub max_steps: u64,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_step: 0.01,
            min_step: 1e-9,
            max_steps: 100_000,
        }
    }
}

impl IntegratorSettings {
    /// # Errors
    ///
    /// `InvalidParameter` unless every value is finite and positive and
    /// `min_step <= max_step`.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("rtol", self.rtol),
            ("atol", self.atol),
            ("max_step", self.max_step),
            ("min_step", self.min_step),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                return Err(TransportError::invalid(format!(
                    "integrator {name} must be finite and > 0, got {value}"
                )));
            }
        }
        if self.min_step > self.max_step {
            return Err(TransportError::invalid(format!(
                "integrator min_step ({}) exceeds max_step ({})",
                self.min_step, self.max_step
            )));
        }
        if self.max_steps == 0 {
            return Err(TransportError::invalid("integrator max_steps must be >= 1"));
        }
        Ok(())
    }
}

/// Position/velocity pair evolved by the integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl KinematicState {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self { position, velocity }
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().chain(self.velocity.iter()).all(|c| c.is_finite())
    }
}

/// Time derivative of a [`KinematicState`]: (dx/dt, dv/dt).
type Derivative = (Vec3, Vec3);

#[inline]
fn derivative(field: &dyn AccelerationField, t: f64, state: &KinematicState) -> Derivative {
    (
        state.velocity,
        field.acceleration(t, &state.position, &state.velocity),
    )
}

/// `state + h * Σ coeffs[i] * stages[i]`
#[inline]
fn offset(state: &KinematicState, h: f64, stages: &[Derivative], coeffs: &[f64]) -> KinematicState {
    let mut out = *state;
    for ((dx, dv), &c) in stages.iter().zip(coeffs) {
        if c != 0.0 {
            out.position += dx * (h * c);
            out.velocity += dv * (h * c);
        }
    }
    out
}

/// Adaptive Runge-Kutta integrator for free flight under an acceleration field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionIntegrator {
    settings: IntegratorSettings,
}

impl MotionIntegrator {
    pub fn new(settings: IntegratorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    /// Advance `state` over `time_span = (t0, t1)`.
    ///
    /// Force-free fields use exact straight-line kinematics; any other field
    /// is integrated with [`MotionIntegrator::integrate`].
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a malformed time span, `NonFiniteState` if the
    /// state stops being finite, `StepLimitExceeded` from the Runge-Kutta path.
    pub fn advance(
        &self,
        state: KinematicState,
        time_span: (f64, f64),
        field: &dyn AccelerationField,
    ) -> Result<KinematicState> {
        let duration = check_span(time_span)?;
        if field.is_force_free() {
            let moved = KinematicState::new(state.position + state.velocity * duration, state.velocity);
            return ensure_finite(moved);
        }
        self.integrate(state, time_span, field)
    }

    /// Integrate `state` over `time_span` with the Dormand-Prince pair,
    /// regardless of whether the field is force-free.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a malformed time span, `NonFiniteState` if an
    /// accepted step produces NaN or infinite components, `StepLimitExceeded`
    /// if the span needs more than `max_steps` attempted steps.
    pub fn integrate(
        &self,
        state: KinematicState,
        time_span: (f64, f64),
        field: &dyn AccelerationField,
    ) -> Result<KinematicState> {
        let duration = check_span(time_span)?;
        let (t0, t1) = time_span;
        if duration == 0.0 {
            return Ok(state);
        }

        let IntegratorSettings {
            max_step,
            min_step,
            max_steps,
            ..
        } = self.settings;

        let mut t = t0;
        let mut y = state;
        let mut h = max_step.min(duration);
        let mut k1 = derivative(field, t, &y);
        let mut steps: u64 = 0;

        while t < t1 {
            if steps >= max_steps {
                return Err(TransportError::StepLimitExceeded {
                    steps,
                    duration,
                });
            }
            steps += 1;
            let remaining = t1 - t;
            let last = h >= remaining;
            if last {
                h = remaining;
            }

            let (y_new, k7, err) = self.try_step(field, t, &y, h, k1);

            let factor = if err <= 1.0 || h <= min_step {
                t = if last { t1 } else { t + h };
                y = ensure_finite(y_new)?;
                k1 = k7;
                if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(ERROR_EXPONENT)).clamp(MIN_FACTOR, MAX_FACTOR)
                }
            } else {
                (SAFETY * err.powf(ERROR_EXPONENT)).clamp(MIN_FACTOR, SAFETY)
            };
            // NaN-safe: f64::max/min ignore a NaN operand
            h = (h * factor).max(min_step).min(max_step);
        }

        Ok(y)
    }

    /// One Dormand-Prince step; returns the 5th order solution, the FSAL
    /// derivative at its end and the scaled RMS error norm.
    fn try_step(
        &self,
        field: &dyn AccelerationField,
        t: f64,
        y: &KinematicState,
        h: f64,
        k1: Derivative,
    ) -> (KinematicState, Derivative, f64) {
        let mut k = [k1; 7];
        for i in 1..6 {
            let stage = offset(y, h, &k[..i], A[i]);
            k[i] = derivative(field, t + C[i] * h, &stage);
        }
        let y_new = offset(y, h, &k[..6], &B);
        k[6] = derivative(field, t + h, &y_new);

        let err_state = offset(
            &KinematicState::new(Vec3::zeros(), Vec3::zeros()),
            h,
            &k,
            &E,
        );
        let components = [
            (err_state.position, y.position, y_new.position),
            (err_state.velocity, y.velocity, y_new.velocity),
        ];
        let mut sum_sq = 0.0;
        for (err, before, after) in components {
            for i in 0..3 {
                let scale =
                    self.settings.atol + self.settings.rtol * before[i].abs().max(after[i].abs());
                sum_sq += (err[i] / scale).powi(2);
            }
        }
        (y_new, k[6], (sum_sq / 6.0).sqrt())
    }
}

fn check_span((t0, t1): (f64, f64)) -> Result<f64> {
    if !t0.is_finite() || !t1.is_finite() || t1 < t0 {
        return Err(TransportError::invalid(format!(
            "time span must be finite with t1 >= t0, got ({t0}, {t1})"
        )));
    }
    Ok(t1 - t0)
}

fn ensure_finite(state: KinematicState) -> Result<KinematicState> {
    if state.is_finite() {
        Ok(state)
    } else {
        Err(TransportError::NonFiniteState(format!(
            "position {:?}, velocity {:?}",
            state.position, state.velocity
        )))
    }
}
