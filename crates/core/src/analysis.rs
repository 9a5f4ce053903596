//! Statistics over simulation output
//!
//! Consumers of [`crate::SimulationResult`] (the headless demo, validation
//! tests) use these to summarise path-length samples and check them against
//! the theoretical exponential free-path distribution, for which the mean and
//! the standard deviation both equal the mean free path.

use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};

/// Percent error below which the measured mean free path is accepted.
pub const DEFAULT_TOLERANCE_PERCENT: f64 = 10.0;

/// Summary statistics of a sample.
///
/// `std_dev` is the population standard deviation (divides by `n`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SampleStats {
    /// Returns `None` for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        Some(Self {
            count: samples.len(),
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }
}

/// Equal-width histogram normalised to a probability density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// `count / (n * width)` per bin; integrates to 1
    pub densities: Vec<f64>,
}

impl Histogram {
    /// Bin `samples` into `bins` equal-width bins spanning their range.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for zero bins, an empty sample or non-finite values.
    pub fn density(samples: &[f64], bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(TransportError::invalid("histogram needs at least one bin"));
        }
        if samples.iter().any(|x| !x.is_finite()) {
            return Err(TransportError::invalid("histogram samples must be finite"));
        }
        let stats = SampleStats::from_samples(samples)
            .ok_or_else(|| TransportError::invalid("histogram of an empty sample"))?;

        let (lo, hi) = if stats.max > stats.min {
            (stats.min, stats.max)
        } else {
            (stats.min - 0.5, stats.max + 0.5)
        };
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for &x in samples {
            let idx = (((x - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        let norm = samples.len() as f64 * width;
        let densities = counts.iter().map(|&c| c as f64 / norm).collect();

        Ok(Self {
            edges,
            counts,
            densities,
        })
    }

    /// Width of the first bin; `None` when there are fewer than two edges.
    pub fn bin_width(&self) -> Option<f64> {
        match self.edges.as_slice() {
            [first, second, ..] => Some(second - first),
            _ => None,
        }
    }
}

/// Comparison of measured path lengths against Exp(λ).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialValidation {
    pub expected_mean: f64,
    pub measured_mean: f64,
    pub mean_error_percent: f64,
    pub expected_std_dev: f64,
    pub measured_std_dev: f64,
    pub std_error_percent: f64,
    pub tolerance_percent: f64,
    /// Mean percent error strictly below the tolerance
    pub passed: bool,
}

impl ExponentialValidation {
    /// # Errors
    ///
    /// `InvalidParameter` for an empty sample, a non-positive mean free path
    /// or a negative tolerance.
    pub fn evaluate(paths: &[f64], mean_free_path: f64, tolerance_percent: f64) -> Result<Self> {
        if !mean_free_path.is_finite() || mean_free_path <= 0.0 {
            return Err(TransportError::invalid(format!(
                "mean_free_path must be finite and > 0, got {mean_free_path}"
            )));
        }
        if !tolerance_percent.is_finite() || tolerance_percent < 0.0 {
            return Err(TransportError::invalid("tolerance must be finite and >= 0"));
        }
        let stats = SampleStats::from_samples(paths)
            .ok_or_else(|| TransportError::invalid("no path lengths to validate"))?;

        let percent = |measured: f64| (measured - mean_free_path).abs() / mean_free_path * 100.0;
        let mean_error_percent = percent(stats.mean);
        Ok(Self {
            expected_mean: mean_free_path,
            measured_mean: stats.mean,
            mean_error_percent,
            expected_std_dev: mean_free_path,
            measured_std_dev: stats.std_dev,
            std_error_percent: percent(stats.std_dev),
            tolerance_percent,
            passed: mean_error_percent < tolerance_percent,
        })
    }
}

/// One-sample Kolmogorov-Smirnov statistic `sup |F_n(x) - F(x)|`.
///
/// Returns 0 for an empty sample.
pub fn ks_statistic<F: Fn(f64) -> f64>(samples: &[f64], cdf: F) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let f = cdf(x);
            let above = (i + 1) as f64 / n - f;
            let below = f - i as f64 / n;
            above.max(below)
        })
        .fold(0.0, f64::max)
}

/// Asymptotic KS critical value `sqrt(-ln(α/2) / 2) / sqrt(n)`.
pub fn ks_critical_value(n: usize, alpha: f64) -> f64 {
    (-(alpha / 2.0).ln() / 2.0).sqrt() / (n as f64).sqrt()
}
