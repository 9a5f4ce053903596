//! Aggregated output of a transport run

use crate::analysis::SampleStats;
use crate::transport::{Termination, TrajectoryRecord};
use serde::{Deserialize, Serialize};

/// Flattened run output.
///
/// `path_lengths` and `sampled_path_lengths` hold one entry per collision
/// across all particles, in particle index order with no boundary markers.
/// `total_distances` and `collision_counts` hold one entry per transported
/// particle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub path_lengths: Vec<f64>,
    pub sampled_path_lengths: Vec<f64>,
    pub total_distances: Vec<f64>,
    pub collision_counts: Vec<u32>,
    /// Particles forcibly terminated at the collision cap
    pub capped_particles: usize,
    /// Particles stopped by a flight longer than the integrator step limit
    pub stalled_particles: usize,
    /// Particles never started because the run budget ran out
    pub skipped_particles: usize,
    /// Seed the run actually used
    pub seed: u64,
}

impl SimulationResult {
    /// Merge per-particle records, `None` marking a skipped particle.
    pub(crate) fn from_records(seed: u64, records: Vec<Option<TrajectoryRecord>>) -> Self {
        let mut result = Self {
            seed,
            ..Self::default()
        };
        result.total_distances.reserve(records.len());
        result.collision_counts.reserve(records.len());

        for record in records {
            let Some(record) = record else {
                result.skipped_particles += 1;
                continue;
            };
            result.path_lengths.extend(record.path_lengths);
            result.sampled_path_lengths.extend(record.sampled_distances);
            result.total_distances.push(record.summary.net_displacement);
            result.collision_counts.push(record.summary.collisions);
            match record.summary.termination {
                Termination::Absorbed => {}
                Termination::CapExceeded => result.capped_particles += 1,
                Termination::Stalled => result.stalled_particles += 1,
            }
        }
        result
    }

    /// Number of particles that were transported.
    pub fn num_particles(&self) -> usize {
        self.collision_counts.len()
    }

    pub fn total_collisions(&self) -> u64 {
        self.collision_counts.iter().map(|&c| u64::from(c)).sum()
    }

    pub fn path_length_stats(&self) -> Option<SampleStats> {
        SampleStats::from_samples(&self.path_lengths)
    }

    pub fn distance_stats(&self) -> Option<SampleStats> {
        SampleStats::from_samples(&self.total_distances)
    }

    pub fn mean_collisions(&self) -> Option<f64> {
        if self.collision_counts.is_empty() {
            return None;
        }
        Some(self.total_collisions() as f64 / self.collision_counts.len() as f64)
    }
}
