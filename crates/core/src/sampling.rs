//! Random variate generation for free paths and scattering angles
//!
//! All samplers take an explicit RNG handle. Nothing here touches a
//! process-wide generator, so each particle can own an independent,
//! reproducible substream and be transported on any thread.
//!
//! # Distributions
//!
//! 1. **Free path** - exponential with scale λ (the mean free path), drawn by
//!    inverse-CDF: `s = -λ ln(1 - u)`
//! 2. **Scattering polar angle** - density ∝ cos θ on [0, π/2], drawn by
//!    rejection against a uniform proposal (acceptance rate 2/π)
//! 3. **Isotropic direction** - uniform on the unit sphere:
//!    `θ = arccos(2u - 1)`, `φ = 2πu'`

use crate::core_types::Vec3;
use crate::error::{Result, TransportError};
use rand::Rng;
use std::f64::consts::{FRAC_PI_2, TAU};

/// Per-sample trial ceiling for the cosine rejection sampler.
///
/// With acceptance probability 2/π the chance of 10,000 consecutive
/// rejections is below 1e-4000, so hitting it means the RNG is broken.
pub const MAX_REJECTION_TRIALS: u32 = 10_000;

fn check_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(TransportError::invalid("sample count must be >= 1"));
    }
    Ok(())
}

fn check_mean_free_path(mean_free_path: f64) -> Result<()> {
    if !mean_free_path.is_finite() || mean_free_path <= 0.0 {
        return Err(TransportError::invalid(format!(
            "mean_free_path must be finite and > 0, got {mean_free_path}"
        )));
    }
    Ok(())
}

/// Draw a single exponential free path with scale `mean_free_path`.
///
/// The caller is responsible for `mean_free_path > 0`; the engine validates
/// it once at configuration time rather than on every collision.
#[inline]
pub fn exponential_free_path<R: Rng + ?Sized>(mean_free_path: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.random();
    -mean_free_path * (1.0 - u).ln()
}

/// Draw `count` exponential free paths by inverse-CDF sampling.
///
/// # Errors
///
/// `InvalidParameter` if `mean_free_path` is not finite and positive or
/// `count` is zero.
pub fn sample_exponential<R: Rng + ?Sized>(
    mean_free_path: f64,
    count: usize,
    rng: &mut R,
) -> Result<Vec<f64>> {
    check_mean_free_path(mean_free_path)?;
    check_count(count)?;
    Ok((0..count)
        .map(|_| exponential_free_path(mean_free_path, rng))
        .collect())
}

/// Draw one polar scattering angle with density proportional to cos θ.
///
/// # Errors
///
/// `SamplingExhausted` if no candidate is accepted within
/// [`MAX_REJECTION_TRIALS`] draws.
pub fn cosine_scattering_angle<R: Rng + ?Sized>(rng: &mut R) -> Result<f64> {
    for _ in 0..MAX_REJECTION_TRIALS {
        let theta = rng.random::<f64>() * FRAC_PI_2;
        let u: f64 = rng.random();
        if u <= theta.cos() {
            return Ok(theta);
        }
    }
    Err(TransportError::SamplingExhausted {
        trials: MAX_REJECTION_TRIALS,
    })
}

/// Draw `count` polar angles on [0, π/2] with density proportional to cos θ.
///
/// # Errors
///
/// `InvalidParameter` for a zero `count`, `SamplingExhausted` if any single
/// sample runs out of trials.
pub fn sample_cosine_angle<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Result<Vec<f64>> {
    check_count(count)?;
    (0..count).map(|_| cosine_scattering_angle(rng)).collect()
}

/// Unit vector from polar angle `theta` (from +z) and azimuth `phi`.
#[inline]
pub(crate) fn spherical_to_cartesian(theta: f64, phi: f64) -> Vec3 {
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}

/// Draw a direction uniformly distributed over the unit sphere.
pub fn sample_isotropic_direction<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let theta = (2.0 * rng.random::<f64>() - 1.0).acos();
    let phi = TAU * rng.random::<f64>();
    spherical_to_cartesian(theta, phi)
}
